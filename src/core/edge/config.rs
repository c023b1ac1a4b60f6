//! Synthesis parameters for the Edge read-aloud service.
//!
//! A [`SynthesisConfig`] is built once per request and never mutated. Construction
//! normalizes the voice identifier and validates the prosody strings against the
//! exact patterns the service accepts:
//!
//! | Field    | Pattern       | Example  |
//! |----------|---------------|----------|
//! | `rate`   | `[+-]\d+%`    | `+10%`   |
//! | `volume` | `[+-]\d+%`    | `-5%`    |
//! | `pitch`  | `[+-]\d+Hz`   | `+0Hz`   |
//!
//! # Voice identifiers
//!
//! Short names such as `en-US-AriaNeural` are rewritten to the full descriptor
//! `Microsoft Server Speech Text to Speech Voice (en-US, AriaNeural)`. Names with an
//! extra locale qualifier (`zh-CN-liaoning-XiaobeiNeural`) fold the qualifier into
//! the region part.

use std::sync::LazyLock;

use regex::Regex;

use super::DEFAULT_VOICE;
use crate::errors::{TtsError, TtsResult};

/// Default speaking rate.
pub const DEFAULT_RATE: &str = "+0%";

/// Default volume.
pub const DEFAULT_VOLUME: &str = "+0%";

/// Default pitch.
pub const DEFAULT_PITCH: &str = "+0Hz";

static SHORT_VOICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z]{2,})-([A-Z]{2,})-(.+Neural)$").expect("short voice pattern is valid")
});

static FULL_VOICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Microsoft Server Speech Text to Speech Voice \(.+,.+\)$")
        .expect("voice descriptor pattern is valid")
});

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]\d+%$").expect("percent pattern is valid"));

static HERTZ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]\d+Hz$").expect("hertz pattern is valid"));

/// Caller-facing synthesis options. Unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisOptions {
    pub voice: Option<String>,
    pub rate: Option<String>,
    pub volume: Option<String>,
    pub pitch: Option<String>,
}

impl SynthesisOptions {
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_rate(mut self, rate: impl Into<String>) -> Self {
        self.rate = Some(rate.into());
        self
    }

    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = Some(volume.into());
        self
    }

    pub fn with_pitch(mut self, pitch: impl Into<String>) -> Self {
        self.pitch = Some(pitch.into());
        self
    }
}

/// Validated, wire-ready synthesis parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisConfig {
    voice: String,
    rate: String,
    volume: String,
    pitch: String,
}

impl SynthesisConfig {
    /// Normalizes the voice identifier and validates every prosody field.
    ///
    /// # Errors
    /// Returns [`TtsError::Validation`] when any field does not match its pattern.
    pub fn new(voice: &str, rate: &str, volume: &str, pitch: &str) -> TtsResult<Self> {
        let voice = normalize_voice(voice);

        validate_param("voice", &voice, &FULL_VOICE_RE)?;
        validate_param("rate", rate, &PERCENT_RE)?;
        validate_param("volume", volume, &PERCENT_RE)?;
        validate_param("pitch", pitch, &HERTZ_RE)?;

        Ok(Self {
            voice,
            rate: rate.to_string(),
            volume: volume.to_string(),
            pitch: pitch.to_string(),
        })
    }

    /// Builds a config from options, using `default_voice` when no voice is set.
    pub fn from_options(options: &SynthesisOptions, default_voice: &str) -> TtsResult<Self> {
        Self::new(
            options.voice.as_deref().unwrap_or(default_voice),
            options.rate.as_deref().unwrap_or(DEFAULT_RATE),
            options.volume.as_deref().unwrap_or(DEFAULT_VOLUME),
            options.pitch.as_deref().unwrap_or(DEFAULT_PITCH),
        )
    }

    /// Fully-qualified voice descriptor.
    #[inline]
    pub fn voice(&self) -> &str {
        &self.voice
    }

    #[inline]
    pub fn rate(&self) -> &str {
        &self.rate
    }

    #[inline]
    pub fn volume(&self) -> &str {
        &self.volume
    }

    #[inline]
    pub fn pitch(&self) -> &str {
        &self.pitch
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            voice: normalize_voice(DEFAULT_VOICE),
            rate: DEFAULT_RATE.to_string(),
            volume: DEFAULT_VOLUME.to_string(),
            pitch: DEFAULT_PITCH.to_string(),
        }
    }
}

/// Rewrites a short voice name into the descriptor form the service expects.
///
/// Input that is not a short name is returned unchanged.
pub fn normalize_voice(voice: &str) -> String {
    let Some(caps) = SHORT_VOICE_RE.captures(voice) else {
        return voice.to_string();
    };

    let lang = &caps[1];
    let mut region = caps[2].to_string();
    let mut name = &caps[3];

    if let Some((qualifier, rest)) = name.split_once('-') {
        region.push('-');
        region.push_str(qualifier);
        name = rest;
    }

    format!("Microsoft Server Speech Text to Speech Voice ({lang}-{region}, {name})")
}

fn validate_param(name: &str, value: &str, pattern: &Regex) -> TtsResult<()> {
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(TtsError::Validation(format!("Invalid {name} '{value}'.")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_voice_is_expanded() {
        assert_eq!(
            normalize_voice("en-US-AriaNeural"),
            "Microsoft Server Speech Text to Speech Voice (en-US, AriaNeural)"
        );
    }

    #[test]
    fn test_locale_qualifier_folds_into_region() {
        assert_eq!(
            normalize_voice("zh-CN-liaoning-XiaobeiNeural"),
            "Microsoft Server Speech Text to Speech Voice (zh-CN-liaoning, XiaobeiNeural)"
        );
    }

    #[test]
    fn test_full_descriptor_passes_through() {
        let full = "Microsoft Server Speech Text to Speech Voice (zh-CN, XiaoxiaoNeural)";
        assert_eq!(normalize_voice(full), full);
        assert!(SynthesisConfig::new(full, "+0%", "+0%", "+0Hz").is_ok());
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = SynthesisConfig::new("en-US-GuyNeural", "+0%", "+0%", "+0Hz").unwrap();
        assert_eq!(config.rate(), "+0%");
        assert_eq!(config.volume(), "+0%");
        assert_eq!(config.pitch(), "+0Hz");
        assert_eq!(
            config.voice(),
            "Microsoft Server Speech Text to Speech Voice (en-US, GuyNeural)"
        );
    }

    #[test]
    fn test_unsigned_rate_is_rejected() {
        let err = SynthesisConfig::new("en-US-GuyNeural", "50%", "+0%", "+0Hz").unwrap_err();
        assert_eq!(err, TtsError::Validation("Invalid rate '50%'.".to_string()));
    }

    #[test]
    fn test_pitch_requires_hz_suffix() {
        assert!(SynthesisConfig::new("en-US-GuyNeural", "+0%", "+0%", "+0%").is_err());
        assert!(SynthesisConfig::new("en-US-GuyNeural", "+0%", "+0%", "-20Hz").is_ok());
    }

    #[test]
    fn test_volume_pattern() {
        assert!(SynthesisConfig::new("en-US-GuyNeural", "+0%", "-50%", "+0Hz").is_ok());
        assert!(SynthesisConfig::new("en-US-GuyNeural", "+0%", "+5.5%", "+0Hz").is_err());
    }

    #[test]
    fn test_unrecognized_voice_is_rejected() {
        let err = SynthesisConfig::new("Aria", "+0%", "+0%", "+0Hz").unwrap_err();
        assert!(matches!(err, TtsError::Validation(msg) if msg.contains("voice")));
    }

    #[test]
    fn test_from_options_applies_defaults() {
        let options = SynthesisOptions::default().with_rate("+25%");
        let config = SynthesisConfig::from_options(&options, DEFAULT_VOICE).unwrap();
        assert_eq!(config.rate(), "+25%");
        assert_eq!(config.pitch(), DEFAULT_PITCH);
        assert!(config.voice().contains("EmmaMultilingualNeural"));
    }

    #[test]
    fn test_default_config_matches_default_voice() {
        let config = SynthesisConfig::default();
        assert_eq!(config, SynthesisConfig::new(DEFAULT_VOICE, "+0%", "+0%", "+0Hz").unwrap());
    }
}
