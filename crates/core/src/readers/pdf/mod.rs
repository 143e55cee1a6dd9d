//! PDF reader: lopdf content streams → positioned runs → laid-out text.
//!
//! Only the first `pdf_page_limit` pages are decoded. Strings are decoded
//! through the active font's encoding (including ToUnicode CMaps on Type0
//! fonts). Fonts that declare no encoding fall back to a BOM/UTF-8/Windows-1252
//! guess.

pub mod layout;

use std::collections::BTreeMap;

use lopdf::content::Content;
use lopdf::{Document, Encoding, Object, ObjectId};

use crate::detect::Format;
use crate::document::{ExtractedText, SourceDocument};
use crate::error::IngestError;
use crate::progress::{report, ProgressHandler, ProgressStage};
use crate::readers::{FormatReader, ReadOptions};

use self::layout::{layout_page, page_separator, truncation_notice, TextRun};

/// How far into the file the `%PDF-` signature may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;
/// `TJ` adjustments more negative than this (thousandths of an em) read as a word gap.
const TJ_WORD_GAP: f64 = -200.0;

#[derive(Default)]
pub struct PdfReader;

impl PdfReader {
    pub fn new() -> Self {
        Self
    }
}

impl FormatReader for PdfReader {
    fn format(&self) -> Format {
        Format::Pdf
    }

    fn read(
        self,
        source: &SourceDocument<'_>,
        opts: &ReadOptions,
        progress: Option<&dyn ProgressHandler>,
    ) -> Result<ExtractedText, IngestError> {
        let doc = load_document(source.bytes)?;

        let pages = doc.get_pages();
        let total = pages.len();
        let limit = opts.pdf_page_limit.min(total);
        tracing::debug!("PDF has {} pages, extracting {}", total, limit);

        let mut text = String::new();
        let mut has_text = false;

        for (i, (_page_number, page_id)) in pages.into_iter().take(limit).enumerate() {
            let content = doc
                .get_page_content(page_id)
                .map_err(|e| IngestError::ExtractionFailed(format!("page {}: {e}", i + 1)))?;
            let content = Content::decode(&content)
                .map_err(|e| IngestError::ExtractionFailed(format!("page {}: {e}", i + 1)))?;

            let encodings = page_encodings(&doc, page_id);
            let page_text = layout_page(&page_runs(&content, &encodings));
            has_text |= !page_text.trim().is_empty();

            text.push_str(&page_separator(i + 1));
            text.push_str(&page_text);

            report(progress, ProgressStage::PdfPage, i + 1, limit, None);
        }

        if !has_text {
            return Err(IngestError::EmptyContent(Format::Pdf.to_string()));
        }

        let mut out = ExtractedText::new(String::new(), Format::Pdf);
        if total > limit {
            text.push_str(&truncation_notice(limit, total));
            out.warn(format!("PDF has {total} pages; only the first {limit} were extracted"));
        }
        out.text = text;
        out.title = info_title(&doc);

        Ok(out)
    }
}

/// Parse the container and unlock it with the empty user password if needed.
fn load_document(bytes: &[u8]) -> Result<Document, IngestError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if !window.windows(5).any(|w| w == b"%PDF-") {
        return Err(IngestError::CorruptBinary {
            format: "PDF".into(),
            detail: "missing %PDF- header".into(),
        });
    }

    let mut doc = Document::load_mem(bytes).map_err(classify_load_error)?;

    if doc.is_encrypted() {
        tracing::debug!("PDF is encrypted, trying empty user password");
        if let Err(e) = doc.decrypt("") {
            tracing::debug!("Empty password rejected: {}", e);
            return Err(IngestError::PasswordProtected);
        }
    }

    Ok(doc)
}

fn classify_load_error(e: lopdf::Error) -> IngestError {
    match e {
        lopdf::Error::Decryption(_) => IngestError::PasswordProtected,
        other => IngestError::invalid_container("PDF", other.to_string()),
    }
}

fn info_title(doc: &Document) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let info = match info {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    let title = match info.get(b"Title").ok()? {
        Object::String(bytes, _) => decode_pdf_string(bytes).trim().to_string(),
        _ => return None,
    };
    Some(title).filter(|t| !t.is_empty())
}

// --- Fonts ---

/// Font resource name to text encoding, for the fonts of one page that declare one.
type FontEncodings<'d> = BTreeMap<Vec<u8>, Encoding<'d>>;

fn page_encodings(doc: &Document, page_id: ObjectId) -> FontEncodings<'_> {
    let fonts = match doc.get_page_fonts(page_id) {
        Ok(fonts) => fonts,
        Err(e) => {
            tracing::debug!("Page fonts unavailable: {}", e);
            return FontEncodings::new();
        }
    };

    fonts
        .into_iter()
        .filter(|(_, font)| font.type_is(b"Font"))
        .filter(|(_, font)| font.has(b"Encoding") || font.has(b"ToUnicode"))
        .filter_map(|(name, font)| match font.get_font_encoding(doc) {
            Ok(encoding) => Some((name, encoding)),
            Err(e) => {
                tracing::debug!("Font {} has no usable encoding: {}", String::from_utf8_lossy(&name), e);
                None
            }
        })
        .collect()
}

// --- Content stream interpretation ---

/// Affine matrix `[a b c d e f]` as used throughout PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translation(tx: f64, ty: f64) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`
    fn then(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() != 6 {
            return None;
        }
        let mut m = [0.0; 6];
        for (slot, obj) in m.iter_mut().zip(operands) {
            *slot = as_num(obj)?;
        }
        Some(Matrix(m))
    }
}

/// Text and graphics state needed to place and decode runs.
struct RunCollector<'e, 'd> {
    encodings: &'e FontEncodings<'d>,
    font: Option<&'e Encoding<'d>>,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    leading: f64,
    runs: Vec<TextRun>,
}

impl<'e, 'd> RunCollector<'e, 'd> {
    fn new(encodings: &'e FontEncodings<'d>) -> Self {
        Self {
            encodings,
            font: None,
            ctm: Matrix::IDENTITY,
            ctm_stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            leading: 0.0,
            runs: Vec::new(),
        }
    }

    /// Baseline of the current text origin in page space.
    fn baseline(&self) -> f64 {
        self.tm.then(&self.ctm).0[5]
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = Matrix::translation(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    /// Decode with the current font, or guess when it declares no encoding.
    fn decode(&self, bytes: &[u8]) -> String {
        if let Some(encoding) = self.font {
            match Document::decode_text(encoding, bytes) {
                Ok(text) => return text,
                Err(e) => tracing::debug!("Font decode failed, guessing: {}", e),
            }
        }
        decode_pdf_string(bytes)
    }

    fn show(&mut self, text: String) {
        let y = self.baseline();
        self.runs.push(TextRun::new(text, y));
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.ctm_stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.ctm = m.then(&self.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "Td" | "TD" => {
                if let [tx, ty] = operands {
                    if let (Some(tx), Some(ty)) = (as_num(tx), as_num(ty)) {
                        if operator == "TD" {
                            self.leading = -ty;
                        }
                        self.move_line(tx, ty);
                    }
                }
            }
            "TL" => {
                if let Some(l) = operands.first().and_then(as_num) {
                    self.leading = l;
                }
            }
            "T*" => self.next_line(),
            "Tf" => {
                let encodings = self.encodings;
                self.font = operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .and_then(|name| encodings.get(name));
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let text = self.decode(bytes);
                    self.show(text);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let text = self.decode(bytes);
                    self.show(text);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    let text = self.decode(bytes);
                    self.show(text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let text = self.join_tj_array(items);
                    self.show(text);
                }
            }
            _ => {}
        }
    }

    fn join_tj_array(&self, items: &[Object]) -> String {
        let mut text = String::new();
        for item in items {
            match item {
                Object::String(bytes, _) => text.push_str(&self.decode(bytes)),
                other => {
                    if as_num(other).is_some_and(|adj| adj < TJ_WORD_GAP) && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
            }
        }
        text
    }
}

/// Collect positioned runs from a decoded content stream, in stream order.
fn page_runs(content: &Content, encodings: &FontEncodings<'_>) -> Vec<TextRun> {
    let mut collector = RunCollector::new(encodings);
    for op in &content.operations {
        collector.apply(&op.operator, &op.operands);
    }
    collector.runs
}

fn as_num(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Decode a PDF string operand without font information.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let (text, _) = encoding_rs::UTF_16BE.decode_without_bom_handling(rest);
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}
