//! EPUB reader: ZIP → container.xml → OPF → spine documents → plain text.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use percent_encoding::percent_decode_str;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use crate::detect::Format;
use crate::document::{ExtractedText, SourceDocument};
use crate::error::IngestError;
use crate::progress::{report, ProgressHandler, ProgressStage};
use crate::readers::{FormatReader, ReadOptions};
use crate::security::{self, SecurityLimits};

const CONTAINER_PATH: &str = "META-INF/container.xml";
const ENCRYPTION_PATH: &str = "META-INF/encryption.xml";

/// Elements whose start begins a new line in the flattened text.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "blockquote", "pre",
    "section", "article", "hr", "dt", "dd", "figcaption",
];

#[derive(Default)]
pub struct EpubReader;

impl EpubReader {
    pub fn new() -> Self {
        Self
    }
}

impl FormatReader for EpubReader {
    fn format(&self) -> Format {
        Format::Epub
    }

    fn read(
        self,
        source: &SourceDocument<'_>,
        opts: &ReadOptions,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<ExtractedText, IngestError> {
        read_epub_impl(Cursor::new(source.bytes), opts, progress)
    }
}

fn read_epub_impl<R: Read + Seek>(
    input: R,
    opts: &ReadOptions,
    progress: Option<&dyn ProgressHandler>,
) -> Result<ExtractedText, IngestError> {
    let mut archive = zip::ZipArchive::new(input)
        .map_err(|e| IngestError::invalid_container("EPUB", format!("Invalid ZIP archive: {e}")))?;

    security::check_file_count(archive.len() as u64, &opts.security)?;

    if let Ok(mut enc_file) = archive.by_name(ENCRYPTION_PATH) {
        let mut enc_xml = String::new();
        if enc_file.read_to_string(&mut enc_xml).is_ok() {
            security::check_epub_drm(&enc_xml)?;
        }
    }

    // 1. container.xml → OPF path
    let opf_path = find_opf_path(&mut archive, &opts.security)?;
    let opf_dir = opf_path
        .rfind('/')
        .map(|i| &opf_path[..i + 1])
        .unwrap_or("")
        .to_string();

    // 2. OPF → manifest + spine
    let opf_bytes = read_archive_entry_bytes(&mut archive, &opf_path, &opts.security)?
        .ok_or_else(|| {
            IngestError::invalid_container("EPUB", format!("Package document {opf_path} is missing"))
        })?;
    let opf = parse_opf(&decode_entry(&opf_bytes))?;

    // 3. Spine documents in reading order
    let mut out = ExtractedText::new(String::new(), Format::Epub);
    out.title = opf.title.clone();

    let mut text = String::new();
    let total_spine = opf.spine.len();

    for (i, idref) in opf.spine.iter().enumerate() {
        report(progress, ProgressStage::SpineItem, i + 1, total_spine, Some(idref));

        let Some(item) = opf.manifest.get(idref) else {
            out.warn(format!("Spine item '{idref}' has no manifest entry; skipped"));
            continue;
        };

        if is_binary_media_type(&item.media_type) {
            out.warn(format!(
                "Spine item '{idref}' is {} and has no text; skipped",
                item.media_type
            ));
            continue;
        }

        let Some(path) = resolve_href(&opf_dir, &item.href) else {
            out.warn(format!("Spine item '{idref}' href '{}' cannot be resolved; skipped", item.href));
            continue;
        };

        let bytes = match read_archive_entry_bytes(&mut archive, &path, &opts.security)? {
            Some(bytes) => Some(bytes),
            // some packagers store percent-encoded names verbatim
            None => {
                let raw = format!("{}{}", opf_dir, strip_fragment(&item.href));
                match security::check_path_traversal(&raw) {
                    Ok(()) if raw != path => read_archive_entry_bytes(&mut archive, &raw, &opts.security)?,
                    _ => None,
                }
            }
        };

        let Some(bytes) = bytes else {
            out.warn(format!("Spine item '{idref}' ({path}) is missing from the archive; skipped"));
            continue;
        };

        let chapter = markup_to_text(&decode_entry(&bytes));
        tracing::debug!("Spine item {} ({}): {} chars", idref, path, chapter.len());
        text.push_str(&chapter);
        text.push_str("\n\n");
    }

    if text.trim().is_empty() {
        return Err(IngestError::EmptyContent(Format::Epub.to_string()));
    }

    out.text = text;
    Ok(out)
}

// --- OPF Parsing ---

#[derive(Debug)]
struct OpfData {
    title: Option<String>,
    manifest: HashMap<String, ManifestItem>,
    spine: Vec<String>,
}

#[derive(Debug, Clone)]
struct ManifestItem {
    href: String,
    media_type: String,
}

fn find_opf_path<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    limits: &SecurityLimits,
) -> Result<String, IngestError> {
    let container = read_archive_entry_bytes(archive, CONTAINER_PATH, limits)?
        .ok_or_else(|| IngestError::invalid_container("EPUB", format!("Missing {CONTAINER_PATH}")))?;
    let container = decode_entry(&container);

    let mut reader = XmlReader::from_str(&container);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"full-path" {
                        let path = attr_value(&attr);
                        security::check_path_traversal(&path)?;
                        return Ok(path);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::invalid_container(
                    "EPUB",
                    format!("Failed to parse container.xml: {e}"),
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    Err(IngestError::invalid_container(
        "EPUB",
        "No rootfile found in container.xml",
    ))
}

fn parse_opf(content: &str) -> Result<OpfData, IngestError> {
    let mut reader = XmlReader::from_str(content);
    let mut buf = Vec::new();

    let mut title: Option<String> = None;
    let mut manifest = HashMap::new();
    let mut spine = Vec::new();
    let mut saw_manifest = false;
    let mut saw_spine = false;

    let mut in_metadata = false;
    let mut in_title = false;
    let mut current_text = String::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            IngestError::invalid_container("EPUB", format!("Failed to parse OPF: {e}"))
        })?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                // <metadata/> or <dc:title/> opens nothing
                let is_start = matches!(event, Event::Start(_));
                match e.local_name().as_ref() {
                    b"metadata" if is_start => in_metadata = true,
                    b"title" if is_start && in_metadata && title.is_none() => {
                        in_title = true;
                        current_text.clear();
                    }
                    b"manifest" => saw_manifest = true,
                    b"spine" => saw_spine = true,
                    b"item" => {
                        let mut id = String::new();
                        let mut href = String::new();
                        let mut media_type = String::new();
                        for attr in e.attributes().flatten() {
                            match attr.key.local_name().as_ref() {
                                b"id" => id = attr_value(&attr),
                                b"href" => href = attr_value(&attr),
                                b"media-type" => media_type = attr_value(&attr),
                                _ => {}
                            }
                        }
                        if !id.is_empty() {
                            manifest.insert(id, ManifestItem { href, media_type });
                        }
                    }
                    b"itemref" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"idref" {
                                spine.push(attr_value(&attr));
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref e) => {
                if in_title {
                    current_text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = false,
                b"title" if in_title => {
                    in_title = false;
                    let t = current_text.trim();
                    if !t.is_empty() {
                        title = Some(t.to_string());
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_manifest {
        return Err(IngestError::MissingManifest("manifest".into()));
    }
    if !saw_spine {
        return Err(IngestError::MissingManifest("spine".into()));
    }

    Ok(OpfData {
        title,
        manifest,
        spine,
    })
}

fn attr_value(attr: &Attribute<'_>) -> String {
    attr.unescape_value()
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Raster images, audio, video and fonts. Anything else (XHTML, SVG, untyped
/// items) goes through the markup stripper.
fn is_binary_media_type(media_type: &str) -> bool {
    let essence = media_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.split_once('/') {
        Some(("image", subtype)) => !subtype.starts_with("svg"),
        Some(("audio" | "video" | "font", _)) => true,
        _ => matches!(
            essence.as_str(),
            "application/octet-stream" | "application/font-woff" | "application/vnd.ms-opentype"
        ),
    }
}

// --- Path resolution ---

fn strip_fragment(href: &str) -> &str {
    href.split('#').next().unwrap_or(href)
}

/// Join `href` onto the OPF directory, percent-decode it, and fold `.`/`..`
/// segments. `None` when the result would leave the archive root.
fn resolve_href(opf_dir: &str, href: &str) -> Option<String> {
    let href = strip_fragment(href);
    if href.is_empty() {
        return None;
    }

    let joined = match href.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{opf_dir}{href}"),
    };
    let decoded = percent_decode_str(&joined).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }

    let path = segments.join("/");
    security::check_path_traversal(&path).ok()?;
    Some(path)
}

// --- Content Flattening ---

/// Keep only text-node content, with a line break where block elements start.
fn markup_to_text(content: &str) -> String {
    let document = scraper::Html::parse_document(content);
    let body_selector = scraper::Selector::parse("body").ok();
    let root = body_selector
        .as_ref()
        .and_then(|sel| document.select(sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    for node in root.descendants() {
        if let Some(element) = node.value().as_element() {
            if BLOCK_ELEMENTS.contains(&element.name()) && !raw.is_empty() && !raw.ends_with('\n') {
                raw.push('\n');
            }
        } else if let Some(text) = node.value().as_text() {
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| matches!(e.name(), "script" | "style"))
            });
            if !hidden {
                raw.push_str(text);
            }
        }
    }

    tidy_lines(&raw)
}

/// Trim every line and collapse runs of blank lines into one.
fn tidy_lines(raw: &str) -> String {
    let mut out = String::new();
    let mut pending_blank = false;
    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            pending_blank = true;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_blank { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        pending_blank = false;
    }
    out
}

// --- Archive Helpers ---

/// `Ok(None)` when the entry does not exist.
fn read_archive_entry_bytes<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    path: &str,
    limits: &SecurityLimits,
) -> Result<Option<Vec<u8>>, IngestError> {
    let mut file = match archive.by_name(path) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(IngestError::invalid_container(
                "EPUB",
                format!("Failed to open {path}: {e}"),
            ))
        }
    };

    security::check_resource_size(path, file.size(), limits)?;

    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf).map_err(|e| {
        IngestError::invalid_container("EPUB", format!("Failed to read {path}: {e}"))
    })?;
    Ok(Some(buf))
}

/// Content documents should be UTF-8; invalid bytes become U+FFFD.
fn decode_entry(bytes: &[u8]) -> String {
    let (text, _) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
    text.into_owned()
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::progress::testing::RecordingProgress;
    use pretty_assertions::assert_eq;

    fn read(bytes: &[u8]) -> Result<ExtractedText, IngestError> {
        let src = SourceDocument::new(bytes, "book.epub", None);
        EpubReader::new().read(&src, &ReadOptions::default(), None)
    }

    fn opf_with(manifest: &str, spine: &str) -> String {
        format!(
            r#"<?xml version="1.0"?><package xmlns="http://www.idpf.org/2007/opf" version="2.0"><metadata/>{manifest}{spine}</package>"#
        )
    }

    #[test]
    fn test_spine_order_wins_over_manifest_order() {
        let out = read(&sample_epub()).unwrap();
        let a = out.text.find("Alpha").unwrap();
        let b = out.text.find("Beta").unwrap();
        let c = out.text.find("Gamma").unwrap();
        assert!(a < b && b < c);
        assert_eq!(out.format, Format::Epub);
        assert_eq!(out.title.as_deref(), Some("Sample & Book"));
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    }

    #[test]
    fn test_markup_and_head_stripped() {
        let out = read(&sample_epub()).unwrap();
        assert!(!out.text.contains('<'));
        assert!(!out.text.contains("ignored head title"));
        assert!(!out.text.contains("color: red"));
        assert!(out.text.starts_with("Chapter 1\nAlpha text.\n\n"));
    }

    #[test]
    fn test_chapters_separated_by_blank_line() {
        let out = read(&sample_epub()).unwrap();
        assert_eq!(
            out.text,
            "Chapter 1\nAlpha text.\n\nChapter 2\nBeta text.\n\nChapter 3\nGamma text.\n\n"
        );
    }

    #[test]
    fn test_missing_chapter_is_warning_not_failure() {
        let opf = opf_with(
            r#"<manifest><item id="a" href="a.xhtml" media-type="application/xhtml+xml"/><item id="b" href="gone.xhtml" media-type="application/xhtml+xml"/></manifest>"#,
            r#"<spine><itemref idref="a"/><itemref idref="b"/><itemref idref="nope"/></spine>"#,
        );
        let epub = build_zip(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", opf.as_str()),
            ("OEBPS/a.xhtml", chapter("<p>Still here</p>").as_str()),
        ]);
        let out = read(&epub).unwrap();
        assert!(out.text.contains("Still here"));
        assert_eq!(out.warnings.len(), 2);
        assert!(out.warnings[0].contains("gone.xhtml"));
        assert!(out.warnings[1].contains("nope"));
    }

    #[test]
    fn test_missing_container_is_invalid() {
        let epub = build_zip(&[("OEBPS/content.opf", "<package/>")]);
        assert!(matches!(read(&epub), Err(IngestError::InvalidContainer { .. })));
    }

    #[test]
    fn test_not_a_zip_is_invalid() {
        assert!(matches!(read(b"not a zip"), Err(IngestError::InvalidContainer { .. })));
    }

    #[test]
    fn test_missing_spine_section() {
        let opf = opf_with(r#"<manifest><item id="a" href="a.xhtml"/></manifest>"#, "");
        let epub = build_zip(&[("META-INF/container.xml", CONTAINER), ("OEBPS/content.opf", opf.as_str())]);
        match read(&epub) {
            Err(IngestError::MissingManifest(section)) => assert_eq!(section, "spine"),
            other => panic!("Expected MissingManifest, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_manifest_section() {
        let opf = opf_with("", r#"<spine><itemref idref="a"/></spine>"#);
        let epub = build_zip(&[("META-INF/container.xml", CONTAINER), ("OEBPS/content.opf", opf.as_str())]);
        assert!(matches!(read(&epub), Err(IngestError::MissingManifest(_))));
    }

    #[test]
    fn test_blank_book_is_empty_content() {
        let opf = opf_with(
            r#"<manifest><item id="a" href="a.xhtml" media-type="application/xhtml+xml"/></manifest>"#,
            r#"<spine><itemref idref="a"/></spine>"#,
        );
        let epub = build_zip(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", opf.as_str()),
            ("OEBPS/a.xhtml", chapter("<p>   </p>").as_str()),
        ]);
        assert!(matches!(read(&epub), Err(IngestError::EmptyContent(_))));
    }

    #[test]
    fn test_image_only_spine_is_empty_content() {
        let opf = opf_with(
            r#"<manifest><item id="p1" href="p1.jpg" media-type="image/jpeg"/></manifest>"#,
            r#"<spine><itemref idref="p1"/></spine>"#,
        );
        let epub = build_zip(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", opf.as_str()),
            ("OEBPS/p1.jpg", "\u{FFFD}JFIF"),
        ]);
        assert!(matches!(read(&epub), Err(IngestError::EmptyContent(_))));
    }

    #[test]
    fn test_svg_spine_item_text_kept() {
        let opf = opf_with(
            r#"<manifest><item id="a" href="a.xhtml" media-type="application/xhtml+xml"/><item id="p1" href="p1.svg" media-type="image/svg+xml"/></manifest>"#,
            r#"<spine><itemref idref="a"/><itemref idref="p1"/></spine>"#,
        );
        let svg = r#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="10">Caption words</text></svg>"#;
        let epub = build_zip(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", opf.as_str()),
            ("OEBPS/a.xhtml", chapter("<p>Body</p>").as_str()),
            ("OEBPS/p1.svg", svg),
        ]);
        let out = read(&epub).unwrap();
        assert_eq!(out.text, "Body\n\nCaption words\n\n");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_binary_media_types() {
        assert!(is_binary_media_type("image/png"));
        assert!(is_binary_media_type("Audio/MPEG"));
        assert!(is_binary_media_type("font/woff2"));
        assert!(!is_binary_media_type("image/svg+xml"));
        assert!(!is_binary_media_type("application/xhtml+xml"));
        assert!(!is_binary_media_type(""));
    }

    #[test]
    fn test_drm_rejected() {
        let enc = r#"<encryption><EncryptedData><KeyInfo><resource xmlns="http://ns.adobe.com/adept"/></KeyInfo></EncryptedData></encryption>"#;
        let epub = build_zip(&[("META-INF/container.xml", CONTAINER), ("META-INF/encryption.xml", enc)]);
        assert!(matches!(read(&epub), Err(IngestError::DrmProtected { .. })));
    }

    #[test]
    fn test_progress_per_spine_item() {
        let epub = sample_epub();
        let src = SourceDocument::new(&epub, "book.epub", None);
        let progress = RecordingProgress::default();
        EpubReader::new()
            .read(&src, &ReadOptions::default(), Some(&progress))
            .unwrap();
        assert_eq!(progress.count(), 3);
        let details: Vec<Option<String>> = progress.snapshot().into_iter().map(|e| e.detail).collect();
        assert_eq!(details, vec![Some("c1".into()), Some("c2".into()), Some("c3".into())]);
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS/", "text/ch1.xhtml").as_deref(), Some("OEBPS/text/ch1.xhtml"));
        assert_eq!(resolve_href("OEBPS/text/", "../images/a.xhtml#x").as_deref(), Some("OEBPS/images/a.xhtml"));
        assert_eq!(resolve_href("", "ch%201.xhtml").as_deref(), Some("ch 1.xhtml"));
        assert_eq!(resolve_href("OEBPS/", "/root.xhtml").as_deref(), Some("root.xhtml"));
        assert_eq!(resolve_href("", "../../etc/passwd"), None);
        assert_eq!(resolve_href("OEBPS/", "#only-fragment"), None);
    }

    #[test]
    fn test_markup_to_text_skips_scripts() {
        let text = markup_to_text(&chapter("<p>Keep</p><script>var drop = 1;</script><div>Also</div>"));
        assert_eq!(text, "Keep\nAlso");
    }
}
