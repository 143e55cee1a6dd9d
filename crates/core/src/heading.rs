//! Heading-like line detection for the table of contents.
//!
//! Each [`HeadingStyle`] is a single matcher. [`detect`] tries them in
//! [`HeadingStyle::PRIORITY`] order and returns the first hit.

use std::sync::LazyLock;

use regex::Regex;

/// Longest title kept in a TOC entry, in characters.
pub const MAX_TITLE_CHARS: usize = 20;
const ELLIPSIS: &str = "...";

static ATX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s").unwrap());
static CJK_CHAPTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^第[0-9０-９零〇一二两三四五六七八九十百千万]+[章回节卷]").unwrap()
});
static NUMBERED_CHAPTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^chapter\s+\d+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingStyle {
    /// Markdown `#` through `######` followed by whitespace.
    Atx,
    /// `第` + numeral + one of `章回节卷`, e.g. `第十二回`.
    CjkChapter,
    /// `Chapter 12`, any case.
    NumberedChapter,
}

impl HeadingStyle {
    pub const PRIORITY: [HeadingStyle; 3] = [
        HeadingStyle::Atx,
        HeadingStyle::CjkChapter,
        HeadingStyle::NumberedChapter,
    ];

    pub fn match_line(&self, line: &str) -> Option<Heading> {
        let line = line.trim_start();
        let level = match self {
            HeadingStyle::Atx => {
                let caps = ATX.captures(line)?;
                caps.get(1).map_or(1, |m| m.as_str().len() as u8)
            }
            HeadingStyle::CjkChapter => {
                CJK_CHAPTER.find(line)?;
                1
            }
            HeadingStyle::NumberedChapter => {
                NUMBERED_CHAPTER.find(line)?;
                1
            }
        };

        let title = display_title(line);
        if title.is_empty() {
            return None;
        }
        Some(Heading { level, title })
    }
}

/// First matching heading style for `line`, if any.
pub fn detect(line: &str) -> Option<Heading> {
    HeadingStyle::PRIORITY
        .iter()
        .find_map(|style| style.match_line(line))
}

/// Strip leading `#`/whitespace and bound the length.
fn display_title(line: &str) -> String {
    let stripped = line
        .trim_start_matches(|c: char| c == '#' || c.is_whitespace())
        .trim_end();

    if stripped.chars().count() > MAX_TITLE_CHARS {
        let mut title: String = stripped.chars().take(MAX_TITLE_CHARS).collect();
        title.push_str(ELLIPSIS);
        title
    } else {
        stripped.to_string()
    }
}
