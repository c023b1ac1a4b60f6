pub mod tts_error;

pub use tts_error::{TtsError, TtsResult};
