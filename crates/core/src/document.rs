use serde::{Deserialize, Serialize};

use crate::detect::Format;

/// Raw input for one ingestion call. Borrowed, never retained past the call.
#[derive(Debug, Clone, Copy)]
pub struct SourceDocument<'a> {
    pub bytes: &'a [u8],
    pub declared_name: &'a str,
    pub declared_mime: Option<&'a str>,
}

impl<'a> SourceDocument<'a> {
    pub fn new(bytes: &'a [u8], declared_name: &'a str, declared_mime: Option<&'a str>) -> Self {
        Self {
            bytes,
            declared_name,
            declared_mime,
        }
    }

    /// Filename without directories or extension, if any is left.
    pub fn name_stem(&self) -> Option<String> {
        std::path::Path::new(self.declared_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// The fully extracted text of one document. Pagination only ever runs on this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub format: Format,
    /// Non-fatal anomalies, in the order they were encountered.
    pub warnings: Vec<String>,
    /// Best-effort display title (package metadata, PDF info, or filename).
    pub title: Option<String>,
}

impl ExtractedText {
    pub fn new(text: String, format: Format) -> Self {
        Self {
            text,
            format,
            warnings: Vec::new(),
            title: None,
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based, without gaps.
    pub ordinal: usize,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    /// 0-based index into `Pagination::pages`.
    pub page_index: usize,
    pub level: u8,
}

/// Pages and derived table of contents for one text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub pages: Vec<Page>,
    pub toc: Vec<TocEntry>,
}

impl Pagination {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Look up a page by its 1-based ordinal.
    pub fn page(&self, ordinal: usize) -> Option<&Page> {
        ordinal.checked_sub(1).and_then(|i| self.pages.get(i))
    }

    /// TOC entries that point at the page with the given 0-based index.
    pub fn toc_for_page(&self, page_index: usize) -> impl Iterator<Item = &TocEntry> {
        self.toc.iter().filter(move |e| e.page_index == page_index)
    }

    /// Concatenation of all pages, which is the paginated text itself.
    pub fn text(&self) -> String {
        self.pages.iter().map(|p| p.content.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_stem() {
        let src = SourceDocument::new(b"", "dir/My Book.epub", None);
        assert_eq!(src.name_stem().as_deref(), Some("My Book"));
        assert_eq!(SourceDocument::new(b"", "", None).name_stem(), None);
    }

    #[test]
    fn test_page_lookup_is_one_based() {
        let p = Pagination {
            pages: vec![
                Page { ordinal: 1, content: "a".into() },
                Page { ordinal: 2, content: "b".into() },
            ],
            toc: vec![TocEntry { title: "B".into(), page_index: 1, level: 1 }],
        };
        assert_eq!(p.page(0), None);
        assert_eq!(p.page(2).map(|pg| pg.content.as_str()), Some("b"));
        assert_eq!(p.toc_for_page(1).count(), 1);
        assert_eq!(p.text(), "ab");
    }

    #[test]
    fn test_extracted_text_json_shape() {
        let mut out = ExtractedText::new("body".into(), Format::Markdown);
        out.warnings.push("skipped".into());
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["format"], "md");
        assert_eq!(value["warnings"][0], "skipped");
        assert!(value["title"].is_null());
    }
}
