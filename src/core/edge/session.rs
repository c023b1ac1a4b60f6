//! One synthesis session per text segment.
//!
//! ```text
//! Connecting ──open──▶ ConfigSent ──ssml──▶ StreamingSsml ──turn.end──▶ Draining ──close──▶ Closed
//!      │                   │                     │                          │
//!      └───────────────────┴──────── error ──────┴──────────────────────────┴──▶ Failed
//! ```
//!
//! [`SegmentSession`] holds the per-frame rules and is free of I/O. [`run_session`]
//! drives it over any sink/stream pair of WebSocket messages, and [`connect`]
//! opens the signed socket to the service.

use std::fmt;
use std::time::Duration;

use async_stream::try_stream;
use futures::{Sink, SinkExt, Stream, StreamExt};
use http::{HeaderName, HeaderValue, StatusCode};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use super::messages::{
    ProtocolMessage, decode_audio_frame, parse_metadata, parse_text_frame, speech_config_frame,
    timestamp_now,
};
use super::signer::RequestSigner;
use super::{SEC_MS_GEC_VERSION, TRUSTED_CLIENT_TOKEN, WSS_HEADERS};
use crate::config::ClientConfig;
use crate::errors::{TtsError, TtsResult};

/// Socket type returned by [`connect`].
pub type EdgeSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// State Machine
// =============================================================================

/// Lifecycle of one segment's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Connecting,
    ConfigSent,
    StreamingSsml,
    Draining,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::ConfigSent => "config_sent",
            Self::StreamingSsml => "streaming_ssml",
            Self::Draining => "draining",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of handling one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A message to hand to the caller.
    Message(ProtocolMessage),
    /// The frame carries nothing for the caller.
    Ignored,
    /// The service finished the turn; the socket should be closed.
    TurnEnd,
}

/// Per-segment protocol state.
#[derive(Debug, Default)]
pub struct SegmentSession {
    state: SessionState,
    compensation: u64,
    audio_chunks: usize,
}

impl SegmentSession {
    /// `compensation` is the tick offset where this segment starts within the
    /// overall request.
    pub fn new(compensation: u64) -> Self {
        Self {
            compensation,
            ..Default::default()
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn audio_chunks(&self) -> usize {
        self.audio_chunks
    }

    pub fn compensation(&self) -> u64 {
        self.compensation
    }

    pub fn config_sent(&mut self) {
        self.state = SessionState::ConfigSent;
    }

    pub fn ssml_sent(&mut self) {
        self.state = SessionState::StreamingSsml;
    }

    /// Moves to [`SessionState::Failed`] and hands the error back.
    pub fn fail(&mut self, err: TtsError) -> TtsError {
        warn!("Session failed in state {}: {}", self.state, err);
        self.state = SessionState::Failed;
        err
    }

    /// Applies one inbound frame.
    pub fn on_message(&mut self, message: Message) -> TtsResult<SessionEvent> {
        let result = match message {
            Message::Text(text) => self.on_text(text.as_str()),
            Message::Binary(data) => self.on_binary(&data),
            Message::Close(_) => {
                return self.on_close().map(SessionEvent::Message);
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(SessionEvent::Ignored),
        };
        result.map_err(|e| self.fail(e))
    }

    /// Handles the socket closing.
    ///
    /// # Errors
    /// Returns [`TtsError::NoAudioReceived`] if no audio chunk arrived.
    pub fn on_close(&mut self) -> TtsResult<ProtocolMessage> {
        if self.audio_chunks == 0 {
            return Err(self.fail(TtsError::NoAudioReceived));
        }
        debug!("Session closed after {} audio chunk(s)", self.audio_chunks);
        self.state = SessionState::Closed;
        Ok(ProtocolMessage::SessionEnd)
    }

    fn on_text(&mut self, frame: &str) -> TtsResult<SessionEvent> {
        let (headers, body) = parse_text_frame(frame);

        match headers.path() {
            Some("audio.metadata") => {
                let boundary = parse_metadata(body, self.compensation)?;
                Ok(SessionEvent::Message(ProtocolMessage::WordBoundary(boundary)))
            }
            Some("turn.end") => {
                self.state = SessionState::Draining;
                Ok(SessionEvent::TurnEnd)
            }
            Some("response") | Some("turn.start") => Ok(SessionEvent::Ignored),
            other => Err(TtsError::UnknownResponse(format!(
                "Unknown path received: {}",
                other.unwrap_or_default()
            ))),
        }
    }

    fn on_binary(&mut self, frame: &bytes::Bytes) -> TtsResult<SessionEvent> {
        match decode_audio_frame(frame)? {
            Some(audio) => {
                self.audio_chunks += 1;
                Ok(SessionEvent::Message(ProtocolMessage::Audio(audio)))
            }
            None => Ok(SessionEvent::Ignored),
        }
    }
}

// =============================================================================
// Session Driver
// =============================================================================

/// Floor applied to [`SessionTiming::poll_interval`] so idle time always accrues.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Wait limits for the inbound frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Upper bound on a single wait for the next frame.
    pub poll_interval: Duration,
    /// Total idle time tolerated before the session fails.
    pub receive_timeout: Duration,
}

impl From<&ClientConfig> for SessionTiming {
    fn from(config: &ClientConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            receive_timeout: config.receive_timeout,
        }
    }
}

/// Sends the config and SSML frames, then yields messages until the socket
/// closes.
///
/// The stream ends after yielding [`ProtocolMessage::SessionEnd`], or after the
/// first error.
pub fn run_session<Si, St>(
    mut session: SegmentSession,
    ssml_frame: String,
    mut sink: Si,
    mut frames: St,
    timing: SessionTiming,
) -> impl Stream<Item = TtsResult<ProtocolMessage>>
where
    Si: Sink<Message> + Unpin,
    Si::Error: fmt::Display,
    St: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    try_stream! {
        sink.send(Message::Text(speech_config_frame(&timestamp_now()).into()))
            .await
            .map_err(|e| session.fail(TtsError::Transport(format!("Failed to send config: {e}"))))?;
        session.config_sent();

        sink.send(Message::Text(ssml_frame.into()))
            .await
            .map_err(|e| session.fail(TtsError::Transport(format!("Failed to send SSML: {e}"))))?;
        session.ssml_sent();

        let poll_interval = timing.poll_interval.max(MIN_POLL_INTERVAL);
        let mut idle = Duration::ZERO;
        loop {
            let next = match timeout(poll_interval, frames.next()).await {
                Ok(next) => {
                    idle = Duration::ZERO;
                    next
                }
                Err(_) => {
                    idle += poll_interval;
                    if idle >= timing.receive_timeout {
                        Err::<(), _>(session.fail(TtsError::Transport(format!(
                            "No frame received for {:?}",
                            timing.receive_timeout
                        ))))?;
                    }
                    continue;
                }
            };

            let message = match next {
                None => {
                    yield session.on_close()?;
                    break;
                }
                Some(Ok(message)) => message,
                Some(Err(
                    tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                )) if session.state() == SessionState::Draining => {
                    yield session.on_close()?;
                    break;
                }
                Some(Err(e)) => Err(session.fail(TtsError::Transport(e.to_string())))?,
            };

            match session.on_message(message)? {
                SessionEvent::Message(ProtocolMessage::SessionEnd) => {
                    yield ProtocolMessage::SessionEnd;
                    break;
                }
                SessionEvent::Message(message) => yield message,
                SessionEvent::Ignored => {}
                SessionEvent::TurnEnd => {
                    debug!("turn.end received, closing socket");
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        debug!("Close frame not sent: {}", e);
                    }
                }
            }
        }
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Handshake failure, split by whether skew recovery applies.
#[derive(Debug)]
pub enum HandshakeError {
    /// The service answered 403; `date` is its `Date` header, if any.
    Forbidden { date: Option<String> },
    /// Any other failure.
    Failed(TtsError),
}

impl From<TtsError> for HandshakeError {
    fn from(err: TtsError) -> Self {
        Self::Failed(err)
    }
}

/// Builds the signed socket URL for one connection.
pub fn signed_socket_url(base: &str, signer: &RequestSigner, connection_id: &str) -> TtsResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| TtsError::Config(format!("Invalid socket URL '{base}': {e}")))?;
    url.query_pairs_mut()
        .append_pair("TrustedClientToken", TRUSTED_CLIENT_TOKEN)
        .append_pair("Sec-MS-GEC", &signer.generate_auth_token())
        .append_pair("Sec-MS-GEC-Version", SEC_MS_GEC_VERSION)
        .append_pair("ConnectionId", connection_id);
    Ok(url)
}

/// Opens a signed socket to the synthesis endpoint.
pub async fn connect(
    config: &ClientConfig,
    signer: &RequestSigner,
) -> Result<EdgeSocket, HandshakeError> {
    let connection_id = super::messages::connect_id();
    let url = signed_socket_url(&config.wss_url, signer, &connection_id)?;

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| TtsError::Transport(format!("Invalid socket request: {e}")))?;
    for (name, value) in WSS_HEADERS {
        request.headers_mut().insert(
            HeaderName::from_static(*name),
            HeaderValue::from_static(*value),
        );
    }

    debug!("Connecting to {} (connection {})", config.wss_url, connection_id);

    match timeout(config.connect_timeout, connect_async(request)).await {
        Ok(Ok((socket, response))) => {
            info!("Connected to synthesis endpoint (status: {})", response.status());
            Ok(socket)
        }
        Ok(Err(tungstenite::Error::Http(response))) if response.status() == StatusCode::FORBIDDEN => {
            let date = response
                .headers()
                .get(http::header::DATE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            warn!("Handshake rejected with 403 (server date: {:?})", date);
            Err(HandshakeError::Forbidden { date })
        }
        Ok(Err(tungstenite::Error::Http(response))) => Err(HandshakeError::Failed(TtsError::Http {
            status: response.status().as_u16(),
            message: "WebSocket handshake rejected".to_string(),
        })),
        Ok(Err(e)) => Err(HandshakeError::Failed(e.into())),
        Err(_) => Err(HandshakeError::Failed(TtsError::ConnectionTimeout(
            config.connect_timeout,
        ))),
    }
}
