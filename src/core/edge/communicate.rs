//! Multi-segment synthesis.
//!
//! [`Communicate`] validates its inputs up front and then runs one
//! [`run_session`] per text segment, strictly in order. Word boundary offsets
//! of each segment start where the previous segment's last word ended.
//!
//! [`EdgeTts`] is the entry point most callers want: it owns the client
//! configuration and the request signer and hands out streams.

use std::pin::pin;
use std::sync::Arc;

use async_stream::try_stream;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::config::{SynthesisConfig, SynthesisOptions};
use super::messages::{ProtocolMessage, WordBoundary, connect_id, mkssml, ssml_frame, timestamp_now};
use super::segmenter::{TextSegment, segment};
use super::session::{
    EdgeSocket, HandshakeError, SegmentSession, SessionTiming, connect, run_session,
};
use super::signer::{ClockSource, RequestSigner};
use super::voices::{self, Voice, VoicesManager};
use crate::config::ClientConfig;
use crate::core::captions::CaptionBuilder;
use crate::errors::{TtsError, TtsResult};

/// One synthesis request, ready to stream.
#[derive(Debug, Clone)]
pub struct Communicate {
    config: SynthesisConfig,
    segments: Vec<TextSegment>,
    client: ClientConfig,
    signer: RequestSigner,
}

impl Communicate {
    /// Validates the options and segments the text.
    ///
    /// # Errors
    /// [`TtsError::Config`], [`TtsError::Validation`] or
    /// [`TtsError::Segmentation`]; no connection is attempted in any case.
    pub fn new(
        text: &str,
        options: &SynthesisOptions,
        client: ClientConfig,
        signer: RequestSigner,
    ) -> TtsResult<Self> {
        client.validate()?;
        let config = SynthesisConfig::from_options(options, &client.default_voice)?;
        let segments = segment(text, client.max_segment_bytes)?;

        debug!(
            "Prepared request: voice={}, {} segment(s)",
            config.voice(),
            segments.len()
        );

        Ok(Self {
            config,
            segments,
            client,
            signer,
        })
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn segments(&self) -> &[TextSegment] {
        &self.segments
    }

    /// Streams every segment's messages in order.
    ///
    /// Each segment ends with [`ProtocolMessage::SessionEnd`]. The stream stops
    /// at the first error. Dropping it closes the active socket.
    pub fn stream(self) -> impl Stream<Item = TtsResult<ProtocolMessage>> {
        try_stream! {
            let timing = SessionTiming::from(&self.client);
            let total = self.segments.len();
            let mut compensation = 0u64;

            for (index, text) in self.segments.iter().enumerate() {
                info!("Synthesizing segment {}/{} ({} bytes)", index + 1, total, text.len());

                let socket = connect_with_retry(&self.client, &self.signer).await?;
                let (sink, frames) = socket.split();

                let ssml = mkssml(&self.config, text);
                let frame = ssml_frame(&connect_id(), &timestamp_now(), &ssml);
                let mut messages = pin!(run_session(
                    SegmentSession::new(compensation),
                    frame,
                    sink,
                    frames,
                    timing,
                ));

                let mut last_end = compensation;
                while let Some(message) = messages.next().await {
                    let message = message?;
                    if let ProtocolMessage::WordBoundary(boundary) = &message {
                        last_end = last_end.max(boundary.end());
                    }
                    yield message;
                }
                compensation = last_end;
            }
        }
    }
}

/// Connects, correcting clock skew and retrying once on a 403.
async fn connect_with_retry(client: &ClientConfig, signer: &RequestSigner) -> TtsResult<EdgeSocket> {
    match connect(client, signer).await {
        Ok(socket) => Ok(socket),
        Err(HandshakeError::Forbidden { date }) => {
            signer.adjust_skew(date.as_deref())?;
            info!("Retrying connection after clock skew correction");
            match connect(client, signer).await {
                Ok(socket) => Ok(socket),
                Err(HandshakeError::Forbidden { .. }) => {
                    warn!("Handshake still forbidden after skew correction");
                    Err(TtsError::Http {
                        status: 403,
                        message: "Handshake forbidden after clock skew correction".to_string(),
                    })
                }
                Err(HandshakeError::Failed(e)) => Err(e),
            }
        }
        Err(HandshakeError::Failed(e)) => Err(e),
    }
}

// =============================================================================
// Client Facade
// =============================================================================

/// Everything a drained stream produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisOutput {
    /// Concatenated MP3 audio.
    pub audio: Bytes,
    /// Word boundaries across all segments, in order.
    pub word_boundaries: Vec<WordBoundary>,
}

impl SynthesisOutput {
    /// Renders the word boundaries as SRT, optionally merging cues until each
    /// holds at least `words_per_cue` words.
    pub fn to_srt(&self, words_per_cue: Option<usize>) -> TtsResult<String> {
        let mut builder = CaptionBuilder::new();
        for boundary in &self.word_boundaries {
            builder.feed_boundary(boundary);
        }
        if let Some(words) = words_per_cue {
            builder.merge_cues(words)?;
        }
        Ok(builder.render())
    }
}

/// Edge TTS client.
#[derive(Debug, Clone)]
pub struct EdgeTts {
    config: ClientConfig,
    signer: RequestSigner,
}

impl EdgeTts {
    /// Client sharing the process-wide clock skew.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            signer: RequestSigner::default(),
        }
    }

    /// Client with its own clock source.
    pub fn with_clock(config: ClientConfig, clock: Arc<dyn ClockSource>) -> Self {
        Self {
            config,
            signer: RequestSigner::new(clock),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    /// Prepares a request without opening any connection.
    pub fn communicate(&self, text: &str, options: &SynthesisOptions) -> TtsResult<Communicate> {
        Communicate::new(text, options, self.config.clone(), self.signer.clone())
    }

    /// Validates the request and returns its message stream.
    pub fn synthesize(
        &self,
        text: &str,
        options: &SynthesisOptions,
    ) -> TtsResult<impl Stream<Item = TtsResult<ProtocolMessage>> + use<>> {
        Ok(self.communicate(text, options)?.stream())
    }

    /// Synthesizes `text` and collects the audio and word boundaries.
    pub async fn synthesize_to_end(
        &self,
        text: &str,
        options: &SynthesisOptions,
    ) -> TtsResult<SynthesisOutput> {
        let mut stream = pin!(self.synthesize(text, options)?);
        let mut audio = BytesMut::new();
        let mut word_boundaries = Vec::new();

        while let Some(message) = stream.next().await {
            match message? {
                ProtocolMessage::Audio(chunk) => audio.extend_from_slice(&chunk),
                ProtocolMessage::WordBoundary(boundary) => word_boundaries.push(boundary),
                ProtocolMessage::SessionEnd => {}
            }
        }

        info!(
            "Synthesis complete: {} audio bytes, {} word boundaries",
            audio.len(),
            word_boundaries.len()
        );

        Ok(SynthesisOutput {
            audio: audio.freeze(),
            word_boundaries,
        })
    }

    /// Fetches the voice catalog.
    pub async fn list_voices(&self) -> TtsResult<Vec<Voice>> {
        voices::list_voices(&self.config, &self.signer).await
    }

    /// Fetches the voice catalog wrapped for filtering.
    pub async fn voices_manager(&self) -> TtsResult<VoicesManager> {
        Ok(VoicesManager::new(self.list_voices().await?))
    }
}

impl Default for EdgeTts {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
