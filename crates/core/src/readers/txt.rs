//! Plain text and Markdown reader: bytes through the encoding resolver.

use crate::detect::Format;
use crate::document::{ExtractedText, SourceDocument};
use crate::encoding;
use crate::error::IngestError;
use crate::heading::HeadingStyle;
use crate::progress::ProgressHandler;
use crate::readers::{FormatReader, ReadOptions};

pub struct TxtReader {
    format: Format,
}

impl TxtReader {
    pub fn plain() -> Self {
        Self {
            format: Format::PlainText,
        }
    }

    pub fn markdown() -> Self {
        Self {
            format: Format::Markdown,
        }
    }
}

impl FormatReader for TxtReader {
    fn format(&self) -> Format {
        self.format
    }

    fn read(
        self,
        source: &SourceDocument<'_>,
        _opts: &ReadOptions,
        _progress: Option<&dyn ProgressHandler>,
    ) -> Result<ExtractedText, IngestError> {
        let decoded = encoding::resolve(source.bytes);
        tracing::debug!("Decoded {} as {}", source.declared_name, decoded.encoding);

        let mut out = ExtractedText::new(decoded.text, self.format);
        for w in decoded.warnings {
            out.warn(w);
        }

        if self.format == Format::Markdown {
            out.title = first_top_level_heading(&out.text);
        }

        Ok(out)
    }
}

/// Title of the first `# ` heading, which Markdown documents use as their title.
fn first_top_level_heading(text: &str) -> Option<String> {
    text.lines()
        .filter_map(|line| HeadingStyle::Atx.match_line(line))
        .find(|h| h.level == 1)
        .map(|h| h.title)
}
