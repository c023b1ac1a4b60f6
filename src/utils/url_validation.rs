//! Endpoint URL validation
//!
//! Endpoint overrides come from environment variables and YAML files, so they are
//! checked once at configuration time rather than failing on the first request.
//! A valid endpoint URL:
//! - parses as an absolute URL
//! - uses one of the schemes the caller allows
//! - has a host
//! - carries no fragment (query parameters are appended per request)

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Schemes accepted for the synthesis socket.
pub const SOCKET_SCHEMES: &[&str] = &["wss", "ws"];

/// Schemes accepted for the voice catalog.
pub const HTTP_SCHEMES: &[&str] = &["https", "http"];

/// Errors that can occur during URL validation
#[derive(Debug, Error, PartialEq)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be one of {allowed:?}, got: {scheme}")]
    UnsupportedScheme {
        scheme: String,
        allowed: Vec<String>,
    },

    #[error("URL must have a host")]
    MissingHost,

    #[error("URL must not contain a fragment")]
    FragmentNotAllowed,
}

/// Validates an endpoint URL and returns it parsed.
///
/// # Example
/// ```rust
/// use edge_tts_gateway::utils::url_validation::{SOCKET_SCHEMES, validate_endpoint_url};
///
/// assert!(validate_endpoint_url("wss://speech.example.com/v1", SOCKET_SCHEMES).is_ok());
/// assert!(validate_endpoint_url("https://speech.example.com/v1", SOCKET_SCHEMES).is_err());
/// ```
pub fn validate_endpoint_url(url: &str, allowed_schemes: &[&str]) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;

    let scheme = parsed.scheme();
    if !allowed_schemes.contains(&scheme) {
        warn!(url = %url, "Endpoint URL uses unsupported scheme");
        return Err(UrlValidationError::UnsupportedScheme {
            scheme: scheme.to_string(),
            allowed: allowed_schemes.iter().map(|s| s.to_string()).collect(),
        });
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    if parsed.fragment().is_some() {
        return Err(UrlValidationError::FragmentNotAllowed);
    }

    Ok(parsed)
}
