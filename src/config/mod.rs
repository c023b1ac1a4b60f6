//! Client configuration
//!
//! Configuration comes from environment variables (optionally populated from a
//! `.env` file by the binary) and an optional YAML file.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! | Field                | Env var                          | Default                          |
//! |----------------------|----------------------------------|----------------------------------|
//! | `wss_url`            | `EDGE_TTS_WSS_URL`               | Edge read-aloud socket           |
//! | `voice_list_url`     | `EDGE_TTS_VOICE_LIST_URL`        | Edge voice catalog               |
//! | `connect_timeout`    | `EDGE_TTS_CONNECT_TIMEOUT_SECS`  | 10 s                             |
//! | `receive_timeout`    | `EDGE_TTS_RECEIVE_TIMEOUT_SECS`  | 60 s                             |
//! | `poll_interval`      | `EDGE_TTS_POLL_INTERVAL_MS`      | 50 ms                            |
//! | `default_voice`      | `EDGE_TTS_DEFAULT_VOICE`         | `en-US-EmmaMultilingualNeural`   |
//! | `max_segment_bytes`  | `EDGE_TTS_MAX_SEGMENT_BYTES`     | 4096                             |
//!
//! # Example
//! ```rust,no_run
//! use edge_tts_gateway::config::ClientConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config = ClientConfig::from_file(Path::new("config.yaml"))?;
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::core::edge::{DEFAULT_MAX_SEGMENT_BYTES, DEFAULT_VOICE, VOICE_LIST_URL, WSS_URL};
use crate::errors::{TtsError, TtsResult};
use crate::utils::url_validation::{HTTP_SCHEMES, SOCKET_SCHEMES, validate_endpoint_url};

mod yaml;

pub use yaml::{EdgeYaml, YamlConfig};

pub const ENV_WSS_URL: &str = "EDGE_TTS_WSS_URL";
pub const ENV_VOICE_LIST_URL: &str = "EDGE_TTS_VOICE_LIST_URL";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "EDGE_TTS_CONNECT_TIMEOUT_SECS";
pub const ENV_RECEIVE_TIMEOUT_SECS: &str = "EDGE_TTS_RECEIVE_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL_MS: &str = "EDGE_TTS_POLL_INTERVAL_MS";
pub const ENV_DEFAULT_VOICE: &str = "EDGE_TTS_DEFAULT_VOICE";
pub const ENV_MAX_SEGMENT_BYTES: &str = "EDGE_TTS_MAX_SEGMENT_BYTES";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Settings shared by every request made through one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Synthesis socket endpoint, without query parameters.
    pub wss_url: String,
    /// Voice catalog endpoint, without query parameters.
    pub voice_list_url: String,
    /// Limit on establishing each socket.
    pub connect_timeout: Duration,
    /// Idle time tolerated between inbound frames.
    pub receive_timeout: Duration,
    /// Upper bound on one wait for an inbound frame.
    pub poll_interval: Duration,
    /// Voice used when a request names none.
    pub default_voice: String,
    /// Largest escaped segment per SSML frame.
    pub max_segment_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            wss_url: WSS_URL.to_string(),
            voice_list_url: VOICE_LIST_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_voice: DEFAULT_VOICE.to_string(),
            max_segment_bytes: DEFAULT_MAX_SEGMENT_BYTES,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// # Errors
    /// Returns [`TtsError::Config`] when a variable cannot be parsed or the result
    /// fails validation.
    pub fn from_env() -> TtsResult<Self> {
        let config = Self::default().merge_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file on top of the environment.
    ///
    /// # Errors
    /// Returns [`TtsError::Config`] when the file cannot be read or parsed, when
    /// an environment variable is malformed, or when validation fails.
    pub fn from_file(path: &Path) -> TtsResult<Self> {
        let yaml = YamlConfig::from_file(path)?;
        let config = Self::default().merge_env()?.merge_yaml(yaml);
        config.validate()?;
        debug!("Loaded client configuration from {}", path.display());
        Ok(config)
    }

    /// Checks every field for usable values.
    pub fn validate(&self) -> TtsResult<()> {
        validate_endpoint_url(&self.wss_url, SOCKET_SCHEMES)
            .map_err(|e| TtsError::Config(format!("wss_url: {e}")))?;
        validate_endpoint_url(&self.voice_list_url, HTTP_SCHEMES)
            .map_err(|e| TtsError::Config(format!("voice_list_url: {e}")))?;

        for (name, value) in [
            ("connect_timeout", self.connect_timeout),
            ("receive_timeout", self.receive_timeout),
            ("poll_interval", self.poll_interval),
        ] {
            if value.is_zero() {
                return Err(TtsError::Config(format!("{name} must be greater than zero")));
            }
        }

        if self.max_segment_bytes == 0 {
            return Err(TtsError::Config(
                "max_segment_bytes must be at least 1".to_string(),
            ));
        }

        if self.default_voice.trim().is_empty() {
            return Err(TtsError::Config("default_voice must not be empty".to_string()));
        }

        Ok(())
    }

    fn merge_env(mut self) -> TtsResult<Self> {
        if let Some(url) = env_string(ENV_WSS_URL) {
            self.wss_url = url;
        }
        if let Some(url) = env_string(ENV_VOICE_LIST_URL) {
            self.voice_list_url = url;
        }
        if let Some(secs) = env_parse::<u64>(ENV_CONNECT_TIMEOUT_SECS)? {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>(ENV_RECEIVE_TIMEOUT_SECS)? {
            self.receive_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = env_parse::<u64>(ENV_POLL_INTERVAL_MS)? {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(voice) = env_string(ENV_DEFAULT_VOICE) {
            self.default_voice = voice;
        }
        if let Some(bytes) = env_parse::<usize>(ENV_MAX_SEGMENT_BYTES)? {
            self.max_segment_bytes = bytes;
        }
        Ok(self)
    }

    fn merge_yaml(mut self, yaml: YamlConfig) -> Self {
        let Some(edge) = yaml.edge else {
            return self;
        };

        if let Some(url) = edge.wss_url {
            self.wss_url = url;
        }
        if let Some(url) = edge.voice_list_url {
            self.voice_list_url = url;
        }
        if let Some(secs) = edge.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = edge.receive_timeout_secs {
            self.receive_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = edge.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(voice) = edge.default_voice {
            self.default_voice = voice;
        }
        if let Some(bytes) = edge.max_segment_bytes {
            self.max_segment_bytes = bytes;
        }
        self
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(name: &str) -> TtsResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| TtsError::Config(format!("Invalid {name} '{value}': {e}")))
        })
        .transpose()
}
