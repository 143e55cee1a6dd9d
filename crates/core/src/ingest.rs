//! Ingestion pipeline: guard → select → read → normalize.
//!
//! | Format   | Reader | Fidelity |
//! |----------|--------|----------|
//! | TXT / MD | [`TxtReader`] (encoding resolver) | exact |
//! | PDF      | [`PdfReader`] (baseline layout) | line/paragraph structure |
//! | EPUB     | [`EpubReader`] (spine order) | text only |
//! | MOBI     | [`MobiReader`] (readable-run scan) | lossy |

use crate::detect::{self, Format};
use crate::document::{ExtractedText, SourceDocument};
use crate::encoding;
use crate::error::IngestError;
use crate::progress::ProgressHandler;
use crate::readers::epub::EpubReader;
use crate::readers::mobi::MobiReader;
use crate::readers::pdf::PdfReader;
use crate::readers::txt::TxtReader;
use crate::readers::{FormatReader, ReadOptions};
use crate::security;

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOptions {
    pub read: ReadOptions,
    /// NFC-normalize extracted text before it is returned.
    pub normalize_unicode: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            read: ReadOptions::default(),
            normalize_unicode: true,
        }
    }
}

/// Turn one source document into normalized text, or reject it with a single error.
pub fn ingest(
    source: &SourceDocument<'_>,
    opts: &IngestOptions,
    progress: Option<&dyn ProgressHandler>,
) -> Result<ExtractedText, IngestError> {
    security::check_input_size(source.bytes.len(), &opts.read.security)?;

    let format = detect::select(source.declared_name, source.declared_mime);
    tracing::debug!(
        "Dispatching {} ({} bytes, mime {:?}) to the {} reader",
        source.declared_name,
        source.bytes.len(),
        source.declared_mime,
        format
    );

    let mut out = read_extracted(format, source, &opts.read, progress)?;

    if let Some(sniffed) = detect::sniff(source.bytes) {
        if sniffed != format {
            let message = format!("content looks like {sniffed} but was declared as {format}");
            tracing::warn!("{}", message);
            out.warnings.insert(0, message);
        }
    }

    if opts.normalize_unicode {
        out.text = encoding::normalize_text(&out.text);
    }

    if out.text.trim().is_empty() {
        return Err(IngestError::EmptyContent(format.to_string()));
    }

    if out.title.is_none() {
        out.title = source.name_stem();
    }

    tracing::info!(
        "Ingested {} as {}: {} chars, {} warnings",
        source.declared_name,
        out.format,
        out.text.chars().count(),
        out.warnings.len()
    );
    Ok(out)
}

/// [`ingest`] with default options and no progress reporting.
pub fn ingest_bytes(
    bytes: &[u8],
    filename: &str,
    mime: Option<&str>,
) -> Result<ExtractedText, IngestError> {
    ingest(
        &SourceDocument::new(bytes, filename, mime),
        &IngestOptions::default(),
        None,
    )
}

/// Run the reader for an already selected format.
pub fn read_extracted(
    format: Format,
    source: &SourceDocument<'_>,
    opts: &ReadOptions,
    progress: Option<&dyn ProgressHandler>,
) -> Result<ExtractedText, IngestError> {
    match format {
        Format::PlainText => TxtReader::plain().read(source, opts, progress),
        Format::Markdown => TxtReader::markdown().read(source, opts, progress),
        Format::Pdf => PdfReader::new().read(source, opts, progress),
        Format::Epub => EpubReader::new().read(source, opts, progress),
        Format::Mobi => MobiReader::new().read(source, opts, progress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::epub::testing::{build_zip, sample_epub, CONTAINER};
    use crate::readers::pdf::testing::build_pdf;
    use crate::security::SecurityLimits;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_ingest() {
        let out = ingest_bytes(b"Hello, reader.\n", "notes.txt", None).unwrap();
        assert_eq!(out.text, "Hello, reader.\n");
        assert_eq!(out.format, Format::PlainText);
        assert_eq!(out.title.as_deref(), Some("notes"));
    }

    #[test]
    fn test_unknown_extension_is_plain_text() {
        let out = ingest_bytes(b"some words", "notes.weird", Some("application/x-weird")).unwrap();
        assert_eq!(out.format, Format::PlainText);
        assert_eq!(out.text, "some words");
    }

    #[test]
    fn test_empty_and_whitespace_rejected() {
        assert!(matches!(
            ingest_bytes(b"", "empty.txt", None),
            Err(IngestError::EmptyContent(_))
        ));
        assert!(matches!(
            ingest_bytes(b"  \n\t\r\n  ", "blank.md", None),
            Err(IngestError::EmptyContent(_))
        ));
    }

    #[test]
    fn test_oversized_input_rejected_before_reading() {
        let opts = IngestOptions {
            read: ReadOptions {
                security: SecurityLimits {
                    max_input_bytes: 8,
                    ..SecurityLimits::default()
                },
                ..ReadOptions::default()
            },
            ..IngestOptions::default()
        };
        let src = SourceDocument::new(b"more than eight bytes", "big.txt", None);
        assert!(matches!(
            ingest(&src, &opts, None),
            Err(IngestError::OversizedInput { .. })
        ));
    }

    #[test]
    fn test_pdf_mime_beats_extension() {
        let pdf = build_pdf(&[vec![(72, 700, "Declared by mime")]]);
        let out = ingest_bytes(&pdf, "download.bin", Some("application/pdf")).unwrap();
        assert_eq!(out.format, Format::Pdf);
        assert!(out.text.contains("Declared by mime"));
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    }

    #[test]
    fn test_mislabelled_content_warns_but_keeps_declared_format() {
        let pdf = build_pdf(&[vec![(72, 700, "Really a PDF")]]);
        let out = ingest_bytes(&pdf, "paper.txt", None).unwrap();
        assert_eq!(out.format, Format::PlainText);
        assert_eq!(out.warnings[0], "content looks like PDF but was declared as TXT");
    }

    #[test]
    fn test_epub_title_survives_dispatch() {
        let out = ingest_bytes(&sample_epub(), "Some.File.EPUB", None).unwrap();
        assert_eq!(out.format, Format::Epub);
        assert_eq!(out.title.as_deref(), Some("Sample & Book"));
    }

    #[test]
    fn test_extractor_failure_propagates() {
        assert!(matches!(
            ingest_bytes(b"PK\x03\x04garbage", "broken.epub", None),
            Err(IngestError::InvalidContainer { .. })
        ));
        assert!(matches!(
            ingest_bytes(&[0x01; 200], "blob.mobi", None),
            Err(IngestError::UnextractableBinary { .. })
        ));
    }

    #[test]
    fn test_textless_epub_is_empty_content() {
        let opf = r#"<?xml version="1.0"?><package xmlns="http://www.idpf.org/2007/opf" version="2.0"><metadata/><manifest><item id="p1" href="p1.png" media-type="image/png"/></manifest><spine><itemref idref="p1"/></spine></package>"#;
        let epub = build_zip(&[("META-INF/container.xml", CONTAINER), ("OEBPS/content.opf", opf)]);
        let err = ingest_bytes(&epub, "pictures.epub", None).unwrap_err();
        assert_eq!(err.kind(), "empty_content");
    }

    #[test]
    fn test_nfc_normalization_toggle() {
        let decomposed = "Cafe\u{301}".as_bytes();
        let out = ingest_bytes(decomposed, "cafe.txt", None).unwrap();
        assert_eq!(out.text, "Caf\u{e9}");

        let opts = IngestOptions {
            normalize_unicode: false,
            ..IngestOptions::default()
        };
        let src = SourceDocument::new(decomposed, "cafe.txt", None);
        assert_eq!(ingest(&src, &opts, None).unwrap().text, "Cafe\u{301}");
    }

    #[test]
    fn test_utf8_bom_dropped() {
        let out = ingest_bytes(b"\xEF\xBB\xBFtext", "bom.txt", None).unwrap();
        assert_eq!(out.text, "text");
    }
}
