use serde::Deserialize;
use std::path::Path;

use crate::errors::{TtsError, TtsResult};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override the environment.
///
/// # Example YAML structure
/// ```yaml
/// edge:
///   wss_url: "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1"
///   voice_list_url: "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list"
///   connect_timeout_secs: 10
///   receive_timeout_secs: 60
///   poll_interval_ms: 50
///   default_voice: "en-US-EmmaMultilingualNeural"
///   max_segment_bytes: 4096
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub edge: Option<EdgeYaml>,
}

/// Edge client settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EdgeYaml {
    pub wss_url: Option<String>,
    pub voice_list_url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub receive_timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub default_voice: Option<String>,
    pub max_segment_bytes: Option<usize>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &Path) -> TtsResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TtsError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        serde_yaml::from_str(&contents)
            .map_err(|e| TtsError::Config(format!("Failed to parse YAML config: {e}")))
    }
}
