//! Format selection from declared name/mime, plus advisory magic-byte sniffing.

use serde::{Deserialize, Serialize};

/// Formats the ingestion core can extract text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "txt")]
    PlainText,
    #[serde(rename = "md")]
    Markdown,
    #[serde(rename = "pdf")]
    Pdf,
    #[serde(rename = "epub")]
    Epub,
    #[serde(rename = "mobi")]
    Mobi,
}

impl Format {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::PlainText => "text/plain",
            Format::Markdown => "text/markdown",
            Format::Pdf => "application/pdf",
            Format::Epub => "application/epub+zip",
            Format::Mobi => "application/x-mobipocket-ebook",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::PlainText => "txt",
            Format::Markdown => "md",
            Format::Pdf => "pdf",
            Format::Epub => "epub",
            Format::Mobi => "mobi",
        }
    }

    /// True for formats whose bytes go through the encoding resolver.
    pub fn is_text(&self) -> bool {
        matches!(self, Format::PlainText | Format::Markdown)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension().to_uppercase())
    }
}

/// Pick the extractor format for a declared filename and mime type.
///
/// An explicit `application/pdf` mime wins; otherwise the extension decides,
/// and anything unrecognised is treated as plain text. Never fails.
pub fn select(filename: &str, mime: Option<&str>) -> Format {
    if mime.is_some_and(is_pdf_mime) {
        return Format::Pdf;
    }

    detect_by_suffix(filename).unwrap_or(Format::PlainText)
}

fn is_pdf_mime(mime: &str) -> bool {
    mime.split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/pdf"))
}

/// Case-insensitive suffix match, so dot-files like `.pdf` still count.
fn detect_by_suffix(filename: &str) -> Option<Format> {
    let lower = filename.to_lowercase();
    [Format::Pdf, Format::Epub, Format::Mobi, Format::Markdown]
        .into_iter()
        .find(|format| {
            lower
                .strip_suffix(format.extension())
                .is_some_and(|stem| stem.ends_with('.'))
        })
}

/// Guess a binary format from leading bytes. Advisory only: the dispatcher
/// uses it to warn about mislabelled input, never to reroute it.
pub fn sniff(header: &[u8]) -> Option<Format> {
    if header.starts_with(b"%PDF-") {
        return Some(Format::Pdf);
    }

    if header.starts_with(b"PK\x03\x04") {
        let probe = &header[..header.len().min(256)];
        if contains(probe, b"application/epub+zip") || contains(header, b"META-INF/") {
            return Some(Format::Epub);
        }
        return None;
    }

    // PalmDOC database header: type/creator at offset 60
    if header.len() >= 68 && (&header[60..68] == b"BOOKMOBI" || &header[60..68] == b"TEXtREAd") {
        return Some(Format::Mobi);
    }

    None
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
