//! Voice catalog listing and filtering.
//!
//! The catalog endpoint is signed with the same `Sec-MS-GEC` token as the
//! synthesis socket, and recovers from a 403 the same way: correct the clock
//! from the response `Date` header and retry once.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::signer::RequestSigner;
use super::{SEC_MS_GEC_VERSION, TRUSTED_CLIENT_TOKEN, VOICE_HEADERS};
use crate::config::ClientConfig;
use crate::errors::{TtsError, TtsResult};

/// Category and personality tags of a voice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VoiceTag {
    pub content_categories: Vec<String>,
    pub voice_personalities: Vec<String>,
}

/// One catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Voice {
    /// Full descriptor, e.g. `Microsoft Server Speech Text to Speech Voice (en-US, AriaNeural)`.
    pub name: String,
    /// Short name, e.g. `en-US-AriaNeural`.
    pub short_name: String,
    pub gender: String,
    pub locale: String,
    pub suggested_codec: String,
    pub friendly_name: String,
    pub status: String,
    pub voice_tag: VoiceTag,
    /// Language prefix of `locale`, filled in by [`VoicesManager`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Voice {
    fn trim_tags(mut self) -> Self {
        for tag in self
            .voice_tag
            .content_categories
            .iter_mut()
            .chain(self.voice_tag.voice_personalities.iter_mut())
        {
            *tag = tag.trim().to_string();
        }
        self
    }
}

/// Fetches the voice catalog.
///
/// # Errors
/// - [`TtsError::SkewAdjustment`] if a 403 carries no usable `Date` header
/// - [`TtsError::Http`] for any other non-success status, including a second 403
/// - [`TtsError::Transport`] for connection failures or an unreadable body
pub async fn list_voices(config: &ClientConfig, signer: &RequestSigner) -> TtsResult<Vec<Voice>> {
    let client = reqwest::Client::builder()
        .timeout(config.receive_timeout)
        .connect_timeout(config.connect_timeout)
        .build()?;

    match fetch_voices(&client, config, signer).await {
        Err(VoiceListError::Forbidden { date }) => {
            signer.adjust_skew(date.as_deref())?;
            info!("Retrying voice list after clock skew correction");
            fetch_voices(&client, config, signer)
                .await
                .map_err(VoiceListError::into_tts_error)
        }
        other => other.map_err(VoiceListError::into_tts_error),
    }
}

#[derive(Debug)]
enum VoiceListError {
    Forbidden { date: Option<String> },
    Failed(TtsError),
}

impl VoiceListError {
    fn into_tts_error(self) -> TtsError {
        match self {
            Self::Forbidden { .. } => TtsError::Http {
                status: 403,
                message: "Voice list forbidden".to_string(),
            },
            Self::Failed(e) => e,
        }
    }
}

impl From<reqwest::Error> for VoiceListError {
    fn from(err: reqwest::Error) -> Self {
        Self::Failed(err.into())
    }
}

fn voice_list_url(base: &str, signer: &RequestSigner) -> TtsResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| TtsError::Config(format!("Invalid voice list URL '{base}': {e}")))?;
    url.query_pairs_mut()
        .append_pair("trustedclienttoken", TRUSTED_CLIENT_TOKEN)
        .append_pair("Sec-MS-GEC", &signer.generate_auth_token())
        .append_pair("Sec-MS-GEC-Version", SEC_MS_GEC_VERSION);
    Ok(url)
}

async fn fetch_voices(
    client: &reqwest::Client,
    config: &ClientConfig,
    signer: &RequestSigner,
) -> Result<Vec<Voice>, VoiceListError> {
    let url = voice_list_url(&config.voice_list_url, signer).map_err(VoiceListError::Failed)?;
    debug!("Fetching voice list from {}", config.voice_list_url);

    let mut request = client.get(url);
    for (name, value) in VOICE_HEADERS {
        request = request.header(*name, *value);
    }
    let response = request.send().await?;

    let status = response.status();
    if status == StatusCode::FORBIDDEN {
        let date = response
            .headers()
            .get(reqwest::header::DATE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        warn!("Voice list request rejected with 403 (server date: {:?})", date);
        return Err(VoiceListError::Forbidden { date });
    }

    if !status.is_success() {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(VoiceListError::Failed(TtsError::Http {
            status: status.as_u16(),
            message: error_body,
        }));
    }

    let voices: Vec<Voice> = response
        .json()
        .await
        .map_err(|e| VoiceListError::Failed(TtsError::Transport(format!("Invalid voice list: {e}"))))?;

    info!("Fetched {} voices", voices.len());
    Ok(voices.into_iter().map(Voice::trim_tags).collect())
}

// =============================================================================
// Filtering
// =============================================================================

/// Criteria for [`VoicesManager::find`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceFilter {
    pub gender: Option<String>,
    pub locale: Option<String>,
    pub language: Option<String>,
    pub short_name: Option<String>,
}

impl VoiceFilter {
    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = Some(short_name.into());
        self
    }

    fn matches(&self, voice: &Voice) -> bool {
        fn field(expected: &Option<String>, actual: &str) -> bool {
            expected.as_deref().is_none_or(|expected| expected == actual)
        }

        field(&self.gender, &voice.gender)
            && field(&self.locale, &voice.locale)
            && field(&self.language, voice.language.as_deref().unwrap_or_default())
            && field(&self.short_name, &voice.short_name)
    }
}

/// A fetched catalog with derived languages.
#[derive(Debug, Clone, Default)]
pub struct VoicesManager {
    voices: Vec<Voice>,
}

impl VoicesManager {
    /// Wraps `voices`, deriving each voice's language from its locale.
    pub fn new(voices: Vec<Voice>) -> Self {
        let voices = voices
            .into_iter()
            .map(|mut voice| {
                let language = voice.locale.split('-').next().unwrap_or_default().to_string();
                voice.language = Some(language);
                voice
            })
            .collect();
        Self { voices }
    }

    /// Fetches the catalog and wraps it.
    pub async fn create(config: &ClientConfig, signer: &RequestSigner) -> TtsResult<Self> {
        Ok(Self::new(list_voices(config, signer).await?))
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Voices matching every set field of `filter`.
    pub fn find(&self, filter: &VoiceFilter) -> Vec<&Voice> {
        self.voices.iter().filter(|voice| filter.matches(voice)).collect()
    }
}
