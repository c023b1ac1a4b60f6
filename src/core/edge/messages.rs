//! Wire frames for the Edge read-aloud WebSocket protocol.
//!
//! - **Outgoing frames** (text, CRLF headers + blank line + body)
//!   - `speech.config`: output format and metadata options
//!   - `ssml`: one SSML document per text segment
//!
//! - **Incoming frames**
//!   - text frames with a `Path` header: `turn.start`, `response`,
//!     `audio.metadata`, `turn.end`
//!   - binary frames: 2-byte big-endian header length, CRLF headers, payload
//!
//! Parsed frames surface to callers as [`ProtocolMessage`].

use std::collections::HashMap;

use bytes::Bytes;
use serde::Deserialize;
use time::OffsetDateTime;
use time::macros::format_description;

use super::OUTPUT_FORMAT;
use super::config::SynthesisConfig;
use super::segmenter::{TextSegment, unescape_xml};
use crate::errors::{TtsError, TtsResult};

/// Content type of accepted audio payloads.
pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

// =============================================================================
// Protocol Messages
// =============================================================================

/// Timing metadata for one spoken word, in 100 ns ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordBoundary {
    /// Start offset from the beginning of the overall request.
    pub offset: u64,
    /// Spoken duration.
    pub duration: u64,
    /// Unescaped word text.
    pub text: String,
}

impl WordBoundary {
    /// End offset in ticks, saturating at `u64::MAX`.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.duration)
    }
}

/// Events produced by a synthesis stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// A chunk of MP3 audio.
    Audio(Bytes),
    /// Word timing metadata.
    WordBoundary(WordBoundary),
    /// One segment's session closed cleanly.
    SessionEnd,
}

impl ProtocolMessage {
    pub fn as_audio(&self) -> Option<&Bytes> {
        match self {
            Self::Audio(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_word_boundary(&self) -> Option<&WordBoundary> {
        match self {
            Self::WordBoundary(boundary) => Some(boundary),
            _ => None,
        }
    }
}

// =============================================================================
// Outgoing Frames
// =============================================================================

/// Formats a timestamp the way the service expects in `X-Timestamp`.
pub fn date_to_string(now: OffsetDateTime) -> String {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT+0000 (Coordinated Universal Time)"
    );
    now.to_offset(time::UtcOffset::UTC)
        .format(format)
        .unwrap_or_default()
}

/// Current timestamp in `X-Timestamp` form.
pub fn timestamp_now() -> String {
    date_to_string(OffsetDateTime::now_utc())
}

/// Fresh connection / request identifier: a UUIDv4 without hyphens.
pub fn connect_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Builds the `speech.config` frame sent right after the socket opens.
pub fn speech_config_frame(timestamp: &str) -> String {
    format!(
        "X-Timestamp:{timestamp}\r\n\
         Content-Type:application/json; charset=utf-8\r\n\
         Path:speech.config\r\n\r\n\
         {{\"context\":{{\"synthesis\":{{\"audio\":{{\"metadataoptions\":{{\
         \"sentenceBoundaryEnabled\":\"false\",\"wordBoundaryEnabled\":\"true\"}},\
         \"outputFormat\":\"{OUTPUT_FORMAT}\"}}}}}}}}\r\n"
    )
}

/// Wraps one escaped text segment in an SSML document.
pub fn mkssml(config: &SynthesisConfig, segment: &TextSegment) -> String {
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='en-US'>\
         <voice name='{}'><prosody pitch='{}' rate='{}' volume='{}'>{}</prosody></voice></speak>",
        config.voice(),
        config.pitch(),
        config.rate(),
        config.volume(),
        segment.as_str()
    )
}

/// Builds the `ssml` frame for one segment.
pub fn ssml_frame(request_id: &str, timestamp: &str, ssml: &str) -> String {
    format!(
        "X-RequestId:{request_id}\r\n\
         Content-Type:application/ssml+xml\r\n\
         X-Timestamp:{timestamp}Z\r\n\
         Path:ssml\r\n\r\n\
         {ssml}"
    )
}

// =============================================================================
// Incoming Frames
// =============================================================================

/// Headers of an incoming frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameHeaders(HashMap<String, String>);

impl FrameHeaders {
    fn parse(block: &str) -> Self {
        let headers = block
            .split("\r\n")
            .filter_map(|line| line.split_once(':'))
            .filter(|(key, value)| !key.is_empty() && !value.trim().is_empty())
            .map(|(key, value)| (key.to_string(), value.trim().to_string()))
            .collect();
        Self(headers)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn path(&self) -> Option<&str> {
        self.get("Path")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get("Content-Type")
    }
}

/// Splits a text frame into headers and body.
pub fn parse_text_frame(frame: &str) -> (FrameHeaders, &str) {
    match frame.split_once("\r\n\r\n") {
        Some((headers, body)) => (FrameHeaders::parse(headers), body),
        None => (FrameHeaders::parse(frame), ""),
    }
}

/// Splits a binary frame into headers and payload.
///
/// # Errors
/// Returns [`TtsError::UnexpectedResponse`] when the frame is too short to carry
/// its header length or the declared length exceeds the frame.
pub fn parse_binary_frame(frame: &[u8]) -> TtsResult<(FrameHeaders, &[u8])> {
    if frame.len() < 2 {
        return Err(TtsError::UnexpectedResponse(
            "We received a binary message, but it is missing the header length.".to_string(),
        ));
    }

    let header_len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    if header_len > frame.len() - 2 {
        return Err(TtsError::UnexpectedResponse(
            "The header length is greater than the length of the data.".to_string(),
        ));
    }

    let header_block = String::from_utf8_lossy(&frame[2..2 + header_len]);
    Ok((FrameHeaders::parse(&header_block), &frame[2 + header_len..]))
}

/// Interprets a binary frame as an audio chunk.
///
/// Returns `Ok(None)` for empty non-audio payloads, which the service sends and
/// which carry nothing.
pub fn decode_audio_frame(frame: &Bytes) -> TtsResult<Option<Bytes>> {
    let (headers, payload) = parse_binary_frame(frame)?;

    if headers.path() != Some("audio") {
        return Err(TtsError::UnexpectedResponse(
            "Received binary message, but the path is not audio.".to_string(),
        ));
    }

    if headers.content_type() != Some(AUDIO_CONTENT_TYPE) {
        if payload.is_empty() {
            return Ok(None);
        }
        return Err(TtsError::UnexpectedResponse(
            "Received binary message, but with an unexpected Content-Type.".to_string(),
        ));
    }

    if payload.is_empty() {
        return Err(TtsError::UnexpectedResponse(
            "Received binary message, but it is missing the audio data.".to_string(),
        ));
    }

    let start = frame.len() - payload.len();
    Ok(Some(frame.slice(start..)))
}

#[derive(Debug, Deserialize)]
struct MetadataEnvelope {
    #[serde(rename = "Metadata")]
    metadata: Vec<MetadataEntry>,
}

#[derive(Debug, Deserialize)]
struct MetadataEntry {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Data", default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WordBoundaryData {
    #[serde(rename = "Offset")]
    offset: u64,
    #[serde(rename = "Duration")]
    duration: u64,
    text: WordBoundaryText,
}

#[derive(Debug, Deserialize)]
struct WordBoundaryText {
    #[serde(rename = "Text")]
    text: String,
}

/// Extracts the word boundary from an `audio.metadata` body.
///
/// `compensation` is added to the offset so that boundaries from later
/// segments continue where earlier segments ended.
///
/// # Errors
/// - [`TtsError::UnknownResponse`] for a metadata type other than
///   `WordBoundary` or `SessionEnd`
/// - [`TtsError::UnexpectedResponse`] for malformed JSON or when no
///   `WordBoundary` entry is present
pub fn parse_metadata(body: &str, compensation: u64) -> TtsResult<WordBoundary> {
    let envelope: MetadataEnvelope = serde_json::from_str(body.trim()).map_err(|e| {
        TtsError::UnexpectedResponse(format!("Failed to parse metadata: {e}"))
    })?;

    for entry in envelope.metadata {
        match entry.kind.as_str() {
            "WordBoundary" => {
                let data: WordBoundaryData = entry
                    .data
                    .ok_or_else(|| {
                        TtsError::UnexpectedResponse("WordBoundary without Data".to_string())
                    })
                    .and_then(|data| {
                        serde_json::from_value(data).map_err(|e| {
                            TtsError::UnexpectedResponse(format!(
                                "Malformed WordBoundary data: {e}"
                            ))
                        })
                    })?;

                let offset = data.offset.checked_add(compensation).ok_or_else(|| {
                    TtsError::UnexpectedResponse(format!(
                        "WordBoundary offset {} out of range",
                        data.offset
                    ))
                })?;

                return Ok(WordBoundary {
                    offset,
                    duration: data.duration,
                    text: unescape_xml(&data.text.text),
                });
            }
            "SessionEnd" => continue,
            other => {
                return Err(TtsError::UnknownResponse(format!(
                    "Unknown metadata type: {other}"
                )));
            }
        }
    }

    Err(TtsError::UnexpectedResponse(
        "No WordBoundary metadata found".to_string(),
    ))
}
