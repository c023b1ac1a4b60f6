//! Text segmentation under the service's per-request byte limit.
//!
//! Input text is cleaned and XML-escaped first, because the escaped form is
//! what crosses the wire. The escaped text is then cut into [`TextSegment`]s of
//! at most `max_bytes` bytes. Cut points are chosen in this order:
//!
//! 1. the last newline, else the last space, inside the limit
//! 2. otherwise the last UTF-8 character boundary inside the limit
//!
//! and then moved back before any `&entity;` reference the cut would split.

use std::fmt;

use tracing::debug;

use crate::errors::{TtsError, TtsResult};

/// One protocol-safe chunk of escaped text.
///
/// Always non-empty, trimmed, valid UTF-8 and free of split entity references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment(String);

impl TextSegment {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TextSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TextSegment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Cleans, escapes and splits `text` into segments of at most `max_bytes`.
///
/// # Errors
/// Returns [`TtsError::Segmentation`] if no valid cut point exists, which means
/// `max_bytes` is too small for the text's structure.
pub fn segment(text: &str, max_bytes: usize) -> TtsResult<Vec<TextSegment>> {
    let escaped = escape_xml(&remove_incompatible_characters(text));
    split_text_by_byte_length(&escaped, max_bytes)
}

/// Splits already-escaped text into segments of at most `max_bytes`.
pub fn split_text_by_byte_length(text: &str, max_bytes: usize) -> TtsResult<Vec<TextSegment>> {
    if max_bytes == 0 {
        return Err(TtsError::Segmentation(
            "Maximum byte length must be greater than zero".to_string(),
        ));
    }

    let mut segments = Vec::new();
    let mut rest = text;

    while rest.len() > max_bytes {
        let bytes = rest.as_bytes();
        let split_at = find_last_newline_or_space(&bytes[..max_bytes])
            .unwrap_or_else(|| find_safe_utf8_split_point(rest, max_bytes));
        let split_at = adjust_split_point_for_xml_entity(bytes, split_at);

        if split_at == 0 {
            // A leading separator left over from the previous cut.
            if matches!(bytes[0], b' ' | b'\n') {
                rest = &rest[1..];
                continue;
            }
            return Err(TtsError::Segmentation(
                "Maximum byte length is too small or invalid text structure near '&' or invalid UTF-8"
                    .to_string(),
            ));
        }

        push_trimmed(&mut segments, &rest[..split_at]);
        rest = &rest[split_at..];
    }

    push_trimmed(&mut segments, rest);

    debug!(
        "Split {} bytes into {} segment(s) (limit {})",
        text.len(),
        segments.len(),
        max_bytes
    );
    Ok(segments)
}

fn push_trimmed(segments: &mut Vec<TextSegment>, chunk: &str) {
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        segments.push(TextSegment(chunk.to_string()));
    }
}

fn find_last_newline_or_space(window: &[u8]) -> Option<usize> {
    window
        .iter()
        .rposition(|&b| b == b'\n')
        .or_else(|| window.iter().rposition(|&b| b == b' '))
}

fn find_safe_utf8_split_point(text: &str, limit: usize) -> usize {
    let mut split_at = limit;
    while split_at > 0 && !text.is_char_boundary(split_at) {
        split_at -= 1;
    }
    split_at
}

fn adjust_split_point_for_xml_entity(bytes: &[u8], mut split_at: usize) -> usize {
    while let Some(amp) = bytes[..split_at].iter().rposition(|&b| b == b'&') {
        let terminated = bytes[amp..]
            .iter()
            .position(|&b| b == b';')
            .is_some_and(|offset| amp + offset < split_at);
        if terminated {
            break;
        }
        split_at = amp;
    }
    split_at
}

/// Replaces C0 control characters the service rejects with a space.
///
/// Tab, line feed and carriage return are kept.
pub fn remove_incompatible_characters(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' => ' ',
            _ => c,
        })
        .collect()
}

/// Escapes XML-significant characters.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverses [`escape_xml`].
pub fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
