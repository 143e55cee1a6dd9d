//! Format readers: each turns a [`SourceDocument`] into [`ExtractedText`].
//!
//! Readers are consumed by [`FormatReader::read`], so every ingestion builds a
//! fresh instance and no per-document state (PDF baseline, spine position)
//! outlives the call.

pub mod epub;
pub mod mobi;
pub mod pdf;
pub mod txt;

use crate::detect::Format;
use crate::document::{ExtractedText, SourceDocument};
use crate::error::IngestError;
use crate::progress::ProgressHandler;
use crate::security::SecurityLimits;

/// Maximum number of PDF pages turned into text.
pub const DEFAULT_PDF_PAGE_LIMIT: usize = 50;

pub trait FormatReader {
    /// The format tag attached to this reader's output.
    fn format(&self) -> Format;

    /// Extract the whole document. Any error rejects the document outright.
    fn read(
        self,
        source: &SourceDocument<'_>,
        opts: &ReadOptions,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<ExtractedText, IngestError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    pub security: SecurityLimits,
    pub pdf_page_limit: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            security: SecurityLimits::default(),
            pdf_page_limit: DEFAULT_PDF_PAGE_LIMIT,
        }
    }
}
