pub mod captions;
pub mod edge;

// Re-export commonly used types for convenience
pub use captions::{CaptionBuilder, CaptionCue, build_captions};

pub use edge::{
    ClockSource, Communicate, EdgeTts, ProtocolMessage, RequestSigner, SynthesisConfig,
    SynthesisOptions, SynthesisOutput, SystemClock, TextSegment, Voice, VoiceFilter,
    VoicesManager, WordBoundary,
};
