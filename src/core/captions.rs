//! SRT caption building from word boundary metadata.
//!
//! Each word boundary becomes one cue. [`CaptionBuilder::merge_cues`] then
//! groups consecutive cues so that every cue but the last holds at least the
//! requested number of words.
//!
//! Offsets are 100 ns ticks: seconds = ticks / 10,000,000.

use std::fmt;

use crate::core::edge::{ProtocolMessage, WordBoundary};
use crate::errors::{TtsError, TtsResult};

const TICKS_PER_SECOND: f64 = 10_000_000.0;

/// One numbered subtitle entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    /// 1-based position.
    pub index: usize,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    pub content: String,
}

impl CaptionCue {
    fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

impl fmt::Display for CaptionCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\r\n{} --> {}\r\n{}\r\n",
            self.index,
            format_time(self.start),
            format_time(self.end),
            self.content
        )
    }
}

/// Accumulates cues for one synthesis request.
#[derive(Debug, Clone, Default)]
pub struct CaptionBuilder {
    cues: Vec<CaptionCue>,
}

impl CaptionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> &[CaptionCue] {
        &self.cues
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Adds a cue for a [`ProtocolMessage::WordBoundary`].
    ///
    /// # Errors
    /// Returns [`TtsError::Validation`] for any other message kind.
    pub fn feed(&mut self, message: &ProtocolMessage) -> TtsResult<()> {
        match message {
            ProtocolMessage::WordBoundary(boundary) => {
                self.feed_boundary(boundary);
                Ok(())
            }
            _ => Err(TtsError::Validation(
                "Invalid message type, expected 'WordBoundary' with offset, duration and text"
                    .to_string(),
            )),
        }
    }

    pub fn feed_boundary(&mut self, boundary: &WordBoundary) {
        self.cues.push(CaptionCue {
            index: self.cues.len() + 1,
            start: boundary.offset as f64 / TICKS_PER_SECOND,
            end: boundary.end() as f64 / TICKS_PER_SECOND,
            content: boundary.text.clone(),
        });
    }

    /// Merges consecutive cues while the running cue has fewer than `words`
    /// words, then renumbers from 1.
    ///
    /// # Errors
    /// Returns [`TtsError::Validation`] if `words` is zero.
    pub fn merge_cues(&mut self, words: usize) -> TtsResult<()> {
        if words == 0 {
            return Err(TtsError::Validation(
                "Invalid number of words to merge, expected > 0".to_string(),
            ));
        }

        let mut cues = std::mem::take(&mut self.cues).into_iter();
        let Some(mut current) = cues.next() else {
            return Ok(());
        };

        for cue in cues {
            if current.word_count() < words {
                current.end = cue.end;
                current.content.push(' ');
                current.content.push_str(&cue.content);
            } else {
                self.cues.push(std::mem::replace(&mut current, cue));
            }
        }
        self.cues.push(current);

        for (i, cue) in self.cues.iter_mut().enumerate() {
            cue.index = i + 1;
        }
        Ok(())
    }

    /// Renders all cues as SRT text.
    pub fn render(&self) -> String {
        self.cues
            .iter()
            .map(CaptionCue::to_string)
            .collect::<Vec<_>>()
            .join("\r\n")
    }
}

impl fmt::Display for CaptionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Builds SRT text from a message sequence, ignoring everything but word
/// boundaries.
pub fn build_captions<'a>(
    messages: impl IntoIterator<Item = &'a ProtocolMessage>,
    min_words_per_cue: usize,
) -> TtsResult<String> {
    let mut builder = CaptionBuilder::new();
    for boundary in messages.into_iter().filter_map(ProtocolMessage::as_word_boundary) {
        builder.feed_boundary(boundary);
    }
    builder.merge_cues(min_words_per_cue)?;
    Ok(builder.render())
}

/// `HH:MM:SS,mmm`, rounded to the nearest millisecond.
pub fn format_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_secs / 3600,
        total_secs % 3600 / 60,
        total_secs % 60,
        ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn word(offset: u64, duration: u64, text: &str) -> ProtocolMessage {
        ProtocolMessage::WordBoundary(WordBoundary {
            offset,
            duration,
            text: text.to_string(),
        })
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00:00,000");
        assert_eq!(format_time(1.5), "00:00:01,500");
        assert_eq!(format_time(3725.042), "01:02:05,042");
        // Rounding carries into the seconds field.
        assert_eq!(format_time(59.9996), "00:01:00,000");
    }

    #[test]
    fn test_single_cue_render() {
        let builder = CaptionBuilder {
            cues: vec![CaptionCue {
                index: 1,
                start: 0.0,
                end: 1.5,
                content: "Hi".to_string(),
            }],
        };
        assert_eq!(builder.render(), "1\r\n00:00:00,000 --> 00:00:01,500\r\nHi\r\n");
    }

    #[test]
    fn test_feed_converts_ticks() {
        let mut builder = CaptionBuilder::new();
        builder.feed(&word(12_500_000, 5_000_000, "later")).unwrap();
        let cue = &builder.cues()[0];
        assert_eq!(cue.index, 1);
        assert_eq!(cue.start, 1.25);
        assert_eq!(cue.end, 1.75);
    }

    #[test]
    fn test_feed_rejects_other_messages() {
        let mut builder = CaptionBuilder::new();
        assert!(matches!(
            builder.feed(&ProtocolMessage::Audio(Bytes::from_static(b"x"))),
            Err(TtsError::Validation(_))
        ));
        assert!(builder.feed(&ProtocolMessage::SessionEnd).is_err());
        assert!(builder.is_empty());
    }

    #[test]
    fn test_merge_two_words_into_one_cue() {
        let mut builder = CaptionBuilder::new();
        builder.feed(&word(0, 10_000_000, "Hello")).unwrap();
        builder.feed(&word(10_000_000, 10_000_000, "world")).unwrap();
        builder.merge_cues(5).unwrap();

        assert_eq!(
            builder.cues(),
            &[CaptionCue {
                index: 1,
                start: 0.0,
                end: 2.0,
                content: "Hello world".to_string(),
            }]
        );
    }

    #[test]
    fn test_merge_groups_by_threshold() {
        let mut builder = CaptionBuilder::new();
        for (i, text) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            builder
                .feed(&word(i as u64 * 10_000_000, 10_000_000, text))
                .unwrap();
        }
        builder.merge_cues(2).unwrap();

        let contents: Vec<&str> = builder.cues().iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["a b", "c d", "e"]);
        let indexes: Vec<usize> = builder.cues().iter().map(|c| c.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
        assert_eq!(builder.cues()[1].start, 2.0);
        assert_eq!(builder.cues()[1].end, 4.0);
    }

    #[test]
    fn test_merge_rejects_zero() {
        let mut builder = CaptionBuilder::new();
        assert!(matches!(builder.merge_cues(0), Err(TtsError::Validation(_))));
    }

    #[test]
    fn test_merge_empty_is_noop() {
        let mut builder = CaptionBuilder::new();
        builder.merge_cues(3).unwrap();
        assert_eq!(builder.render(), "");
    }

    #[test]
    fn test_build_captions_skips_audio() {
        let messages = vec![
            ProtocolMessage::Audio(Bytes::from_static(b"x")),
            word(0, 10_000_000, "Hello"),
            word(10_000_000, 10_000_000, "world"),
            ProtocolMessage::SessionEnd,
        ];
        assert_eq!(
            build_captions(&messages, 1).unwrap(),
            "1\r\n00:00:00,000 --> 00:00:01,000\r\nHello\r\n\r\n\
             2\r\n00:00:01,000 --> 00:00:02,000\r\nworld\r\n"
        );
    }
}
