//! Encoding resolution for untagged text buffers, and Unicode normalization.

use encoding_rs::{GB18030, UTF_8};
use unicode_normalization::UnicodeNormalization;

const REPLACEMENT: char = '\u{FFFD}';

/// Result of decoding a plain-text buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedText {
    pub text: String,
    /// Name of the encoding the text was finally decoded with.
    pub encoding: &'static str,
    pub warnings: Vec<String>,
}

/// Decode a TXT/Markdown buffer.
///
/// UTF-8 first, permissively. When more than 1% of the decoded characters
/// are U+FFFD the buffer is re-decoded as GB18030 (superset of GBK/GB2312).
/// Tuned for Chinese corpora; this is not a general charset sniffer.
pub fn resolve(bytes: &[u8]) -> DecodedText {
    let (utf8, _) = UTF_8.decode_with_bom_removal(bytes);
    let utf8_bad = count_replacements(&utf8);

    if !exceeds_threshold(utf8_bad, utf8.chars().count()) {
        return DecodedText {
            text: utf8.into_owned(),
            encoding: UTF_8.name(),
            warnings: Vec::new(),
        };
    }

    tracing::debug!(
        "UTF-8 decode produced {} replacement characters, retrying as GB18030",
        utf8_bad
    );

    let (gb, had_errors) = GB18030.decode_without_bom_handling(bytes);
    let gb_bad = count_replacements(&gb);

    if gb_bad >= utf8_bad {
        return DecodedText {
            text: utf8.into_owned(),
            encoding: UTF_8.name(),
            warnings: vec![format!(
                "Text is not valid UTF-8 ({utf8_bad} undecodable sequences) and GB18030 did not do better; kept lossy UTF-8"
            )],
        };
    }

    let mut warnings = Vec::new();
    if had_errors {
        warnings.push(format!(
            "Decoded as GB18030 with {gb_bad} undecodable sequences remaining"
        ));
    }

    DecodedText {
        text: gb.into_owned(),
        encoding: GB18030.name(),
        warnings,
    }
}

fn count_replacements(text: &str) -> usize {
    text.chars().filter(|&c| c == REPLACEMENT).count()
}

fn exceeds_threshold(bad: usize, total: usize) -> bool {
    bad > 0 && bad * 100 > total
}

/// Canonical composition (NFC), so visually identical text compares equal.
pub fn normalize_text(text: &str) -> String {
    text.nfc().collect()
}
