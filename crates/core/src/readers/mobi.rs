//! MOBI reader: degraded-fidelity text recovery.
//!
//! This is not a MOBI parser. Records are never decompressed; the buffer is
//! scanned for runs of readable characters, which recovers uncompressed
//! (and some PalmDOC-compressed) text and nothing else. Output always starts
//! with [`LOSSY_NOTICE`].

use std::sync::LazyLock;

use regex::Regex;

use crate::detect::Format;
use crate::document::{ExtractedText, SourceDocument};
use crate::error::IngestError;
use crate::progress::ProgressHandler;
use crate::readers::{FormatReader, ReadOptions};

/// Prepended to every successful MOBI extraction.
pub const LOSSY_NOTICE: &str = "[Lossy extraction: this MOBI file was read without a full format parser, so some text may be missing or garbled. Convert it to EPUB for full fidelity.]\n\n";

/// Fewest characters the printable-ASCII fallback must yield.
const MIN_FALLBACK_CHARS: usize = 100;

static READABLE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"[\w\s\x{4e00}-\x{9fa5}\x{3000}-\x{303f}\x{ff00}-\x{ffef}.,!?;:'"()\[\]{}<>\-–—…“”‘’]{10,}"#,
    )
    .unwrap()
});

static MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

#[derive(Default)]
pub struct MobiReader;

impl MobiReader {
    pub fn new() -> Self {
        Self
    }
}

impl FormatReader for MobiReader {
    fn format(&self) -> Format {
        Format::Mobi
    }

    fn read(
        self,
        source: &SourceDocument<'_>,
        _opts: &ReadOptions,
        _progress: Option<&dyn ProgressHandler>,
    ) -> Result<ExtractedText, IngestError> {
        let recovered = match readable_runs(source.bytes) {
            Some(text) => text,
            None => {
                let fallback = printable_ascii(source.bytes);
                let chars = fallback.trim().chars().count();
                if chars < MIN_FALLBACK_CHARS {
                    return Err(IngestError::UnextractableBinary { chars });
                }
                tracing::debug!("No readable runs; using printable ASCII fallback ({} chars)", chars);
                fallback
            }
        };

        let mut out = ExtractedText::new(format!("{LOSSY_NOTICE}{recovered}"), Format::Mobi);
        out.warn("MOBI text was recovered heuristically and may be incomplete");
        out.title = pdb_name(source.bytes);
        Ok(out)
    }
}

/// Runs of readable characters joined by newlines, markup removed. `None`
/// when nothing readable survives.
fn readable_runs(bytes: &[u8]) -> Option<String> {
    let decoded = String::from_utf8_lossy(bytes);
    let joined = READABLE_RUN
        .find_iter(&decoded)
        .map(|m| m.as_str())
        .filter(|run| !run.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let stripped = MARKUP_TAG.replace_all(&joined, "");
    if stripped.trim().is_empty() {
        None
    } else {
        Some(stripped.into_owned())
    }
}

fn printable_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|&&b| (0x20..=0x7e).contains(&b) || matches!(b, b'\n' | b'\r' | b'\t'))
        .map(|&b| b as char)
        .collect()
}

/// Palm database name (bytes 0..32), which Kindle tooling fills with the
/// book title using underscores for spaces.
fn pdb_name(bytes: &[u8]) -> Option<String> {
    let ident = bytes.get(60..68)?;
    if ident != b"BOOKMOBI" && ident != b"TEXtREAd" {
        return None;
    }
    let raw = &bytes[..32];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let name = String::from_utf8_lossy(&raw[..end]).replace('_', " ");
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}
