//! Microsoft Edge read-aloud speech synthesis client.
//!
//! This module speaks the WebSocket protocol used by the Edge browser's
//! read-aloud feature to produce MP3 audio and word-level timing metadata.
//!
//! # Features
//!
//! - **Segmentation**: text is split into escaped chunks under the per-request
//!   byte limit, never inside a UTF-8 sequence or an XML entity
//! - **Signed connections**: every socket carries a time-windowed `Sec-MS-GEC`
//!   token; a 403 handshake corrects clock skew and retries once
//! - **Word boundaries**: offsets continue across segments so the timeline of
//!   the whole request stays monotonic
//! - **Voice catalog**: list and filter the available neural voices
//!
//! # Example
//!
//! ```rust,ignore
//! use edge_tts_gateway::core::edge::{EdgeTts, SynthesisOptions};
//! use futures::StreamExt;
//!
//! let tts = EdgeTts::new(ClientConfig::default());
//! let options = SynthesisOptions::default().with_voice("en-US-AriaNeural");
//! let mut stream = std::pin::pin!(tts.synthesize("Hello, world!", &options)?);
//! while let Some(message) = stream.next().await {
//!     // ProtocolMessage::Audio / WordBoundary / SessionEnd
//! }
//! ```
//!
//! # Endpoints
//!
//! - Synthesis: `wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1`
//! - Voice list: `https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list`

pub mod communicate;
pub mod config;
pub mod messages;
pub mod segmenter;
pub mod session;
pub mod signer;
pub mod voices;


pub use communicate::{Communicate, EdgeTts, SynthesisOutput};
pub use config::{SynthesisConfig, SynthesisOptions};
pub use messages::{ProtocolMessage, WordBoundary};
pub use segmenter::{TextSegment, segment};
pub use session::{SegmentSession, SessionState};
pub use signer::{ClockSource, RequestSigner, SystemClock, global_clock};
pub use voices::{Voice, VoiceFilter, VoicesManager, list_voices};

// =============================================================================
// Protocol Constants
// =============================================================================

/// Fixed client token shared by every Edge installation.
pub const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";

/// Synthesis WebSocket endpoint, without query parameters.
pub const WSS_URL: &str =
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1";

/// Voice catalog endpoint, without query parameters.
pub const VOICE_LIST_URL: &str =
    "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list";

/// Value of the `Sec-MS-GEC-Version` query parameter, tied to the browser build
/// named in [`WSS_HEADERS`].
pub const SEC_MS_GEC_VERSION: &str = "1-132.0.6834.83";

/// Audio codec requested in the `speech.config` frame.
pub const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Voice used when the caller does not pick one.
pub const DEFAULT_VOICE: &str = "en-US-EmmaMultilingualNeural";

/// Largest escaped segment sent in a single SSML frame.
pub const DEFAULT_MAX_SEGMENT_BYTES: usize = 4096;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0";

/// Handshake headers for the synthesis socket.
pub const WSS_HEADERS: &[(&str, &str)] = &[
    ("pragma", "no-cache"),
    ("cache-control", "no-cache"),
    ("origin", "chrome-extension://jdiccldimpdaibmpdkjnbmckianbfold"),
    ("user-agent", USER_AGENT),
    ("accept-encoding", "gzip, deflate, br"),
    ("accept-language", "en-US,en;q=0.9"),
];

/// Request headers for the voice catalog.
///
/// No `accept-encoding`: the HTTP client is built without decompression.
pub const VOICE_HEADERS: &[(&str, &str)] = &[
    ("authority", "speech.platform.bing.com"),
    (
        "sec-ch-ua",
        "\" Not;A Brand\";v=\"99\", \"Microsoft Edge\";v=\"132\", \"Chromium\";v=\"132\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("user-agent", USER_AGENT),
    ("accept", "*/*"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-dest", "empty"),
    ("accept-language", "en-US,en;q=0.9"),
];
