//! Clock-skew-aware request signing.
//!
//! The service authenticates each connection with a `Sec-MS-GEC` token derived
//! only from the current time and a fixed client constant:
//!
//! 1. take the adjusted Unix time and shift it to the Windows epoch
//! 2. truncate to the enclosing 300 second window
//! 3. convert to 100 ns ticks
//! 4. SHA-256 over `"{ticks}{TRUSTED_CLIENT_TOKEN}"`, uppercase hex
//!
//! Client and server agree on the token as long as their clocks are within the
//! same window. When the server rejects a handshake with 403, its `Date` header
//! is used to correct the process-wide skew before a single retry.

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc2822;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info};

use super::TRUSTED_CLIENT_TOKEN;
use crate::errors::{TtsError, TtsResult};

/// Seconds between 1601-01-01 (Windows epoch) and 1970-01-01 (Unix epoch).
pub const WIN_EPOCH_SECONDS: u64 = 11_644_473_600;

/// Token validity window in seconds.
pub const TOKEN_WINDOW_SECONDS: u64 = 300;

/// 100 ns ticks per second.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Source of adjusted wall-clock time.
///
/// The signer only reads time through this trait, so tests can pin the clock.
pub trait ClockSource: Send + Sync + fmt::Debug {
    /// Current Unix time in seconds, including any recorded skew correction.
    fn now(&self) -> f64;

    /// Records the server's view of the current Unix time.
    fn record_server_time(&self, server_unix_seconds: f64);
}

/// System clock with a lock-protected skew offset.
#[derive(Debug, Default)]
pub struct SystemClock {
    skew_seconds: RwLock<f64>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current skew correction in seconds.
    pub fn skew(&self) -> f64 {
        *self.skew_seconds.read()
    }

    fn local_unix_seconds() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> f64 {
        Self::local_unix_seconds() + self.skew()
    }

    fn record_server_time(&self, server_unix_seconds: f64) {
        // Hold the write lock across read-modify-write so concurrent corrections
        // are applied one after another.
        let mut skew = self.skew_seconds.write();
        let client = Self::local_unix_seconds() + *skew;
        let delta = server_unix_seconds - client;
        *skew += delta;
        info!(
            "Adjusted clock skew by {:.3}s (total {:.3}s)",
            delta, *skew
        );
    }
}

static GLOBAL_CLOCK: LazyLock<Arc<SystemClock>> = LazyLock::new(|| Arc::new(SystemClock::new()));

/// Process-wide clock shared by every signer that is not given its own.
pub fn global_clock() -> Arc<dyn ClockSource> {
    GLOBAL_CLOCK.clone()
}

/// Computes `Sec-MS-GEC` tokens from a [`ClockSource`].
#[derive(Debug, Clone)]
pub struct RequestSigner {
    clock: Arc<dyn ClockSource>,
}

impl RequestSigner {
    pub fn new(clock: Arc<dyn ClockSource>) -> Self {
        Self { clock }
    }

    /// Adjusted Unix time in seconds.
    pub fn compute_unix_time(&self) -> f64 {
        self.clock.now()
    }

    /// Token for the current 5 minute window.
    pub fn generate_auth_token(&self) -> String {
        auth_token_at(self.compute_unix_time())
    }

    /// Corrects the clock from a server `Date` header received with a 403.
    ///
    /// # Errors
    /// Returns [`TtsError::SkewAdjustment`] when the header is missing or cannot
    /// be parsed; the caller must not retry in that case.
    pub fn adjust_skew(&self, server_date: Option<&str>) -> TtsResult<()> {
        let Some(date) = server_date else {
            return Err(TtsError::SkewAdjustment(
                "No server date in headers.".to_string(),
            ));
        };

        let server_time = parse_http_date(date).ok_or_else(|| {
            TtsError::SkewAdjustment(format!("Failed to parse server date: {date}"))
        })?;

        debug!("Server date {} parsed as {}", date, server_time);
        self.clock.record_server_time(server_time as f64);
        Ok(())
    }
}

impl Default for RequestSigner {
    fn default() -> Self {
        Self::new(global_clock())
    }
}

/// Token for the window that contains `unix_seconds`.
pub fn auth_token_at(unix_seconds: f64) -> String {
    let windows_seconds = unix_seconds.max(0.0).floor() as u64 + WIN_EPOCH_SECONDS;
    let window_start = windows_seconds - windows_seconds % TOKEN_WINDOW_SECONDS;
    let ticks = window_start * TICKS_PER_SECOND;

    let digest = Sha256::digest(format!("{ticks}{TRUSTED_CLIENT_TOKEN}").as_bytes());
    hex::encode_upper(digest)
}

/// Parses an RFC 2616 / RFC 1123 date (`Sun, 06 Nov 1994 08:49:37 GMT`) into
/// Unix seconds.
pub fn parse_http_date(value: &str) -> Option<i64> {
    let value = value.trim();
    let imf = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );

    if let Ok(parsed) = PrimitiveDateTime::parse(value, imf) {
        return Some(parsed.assume_utc().unix_timestamp());
    }

    OffsetDateTime::parse(value, &Rfc2822)
        .ok()
        .map(|parsed| parsed.unix_timestamp())
}
