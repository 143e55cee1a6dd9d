//! Reading statistics for extracted text: characters, words, lines, reading time.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::readers::pdf::layout::is_cjk;

/// Average silent reading speed used for the time estimate.
const WORDS_PER_MINUTE: f32 = 200.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStats {
    pub character_count: u64,
    pub word_count: u64,
    pub line_count: u64,
    pub sentence_count: u64,
    pub estimated_reading_time_minutes: f32,
}

impl TextStats {
    pub fn of(text: &str) -> Self {
        let character_count = text.chars().count() as u64;
        let word_count = text.split_word_bounds().map(word_weight).sum::<u64>();
        let line_count = text.lines().count() as u64;
        let sentence_count = text
            .matches(|c: char| matches!(c, '.' | '!' | '?' | '。' | '！' | '？'))
            .count() as u64;

        let estimated_reading_time_minutes = if word_count > 0 {
            word_count as f32 / WORDS_PER_MINUTE
        } else {
            0.0
        };

        TextStats {
            character_count,
            word_count,
            line_count,
            sentence_count,
            estimated_reading_time_minutes,
        }
    }
}

/// Ideographs count one word each; other segments count once if they hold
/// any alphanumeric character.
fn word_weight(segment: &str) -> u64 {
    let ideographs = segment.chars().filter(|&c| is_ideograph(c)).count() as u64;
    if ideographs > 0 {
        ideographs
    } else if segment.chars().any(char::is_alphanumeric) {
        1
    } else {
        0
    }
}

fn is_ideograph(c: char) -> bool {
    is_cjk(c) && c.is_alphanumeric()
}
