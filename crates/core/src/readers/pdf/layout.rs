//! Line and paragraph reconstruction from positioned text runs.
//!
//! PDF pages only carry glyph runs at coordinates. Breaks are inferred from
//! the vertical distance between consecutive runs' baselines (origin at the
//! bottom-left, so moving down the page decreases `y`).

/// Baseline drop (in points) above which a new paragraph starts.
pub const PARAGRAPH_GAP: f64 = 24.0;
/// Baseline movement (in points) beyond which runs are on different lines.
pub const LINE_GAP: f64 = 8.0;

/// One string shown by a text operator, with its baseline in page space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub y: f64,
}

impl TextRun {
    pub fn new(text: impl Into<String>, y: f64) -> Self {
        Self {
            text: text.into(),
            y,
        }
    }
}

/// Text reconstruction state for a single page. `last_y` never crosses pages.
#[derive(Debug, Default)]
pub struct PageLayout {
    out: String,
    last_y: Option<f64>,
}

impl PageLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, run: &TextRun) {
        if run.text.trim().is_empty() {
            return;
        }

        if let Some(last_y) = self.last_y {
            let y_diff = last_y - run.y;
            if y_diff > PARAGRAPH_GAP {
                self.out.push_str("\n\n");
            } else if y_diff > LINE_GAP {
                self.out.push('\n');
            } else if y_diff < -LINE_GAP {
                // superscripts and column jumps: soft separator, never a break
                self.out.push(' ');
            } else if self.needs_space_before(&run.text) {
                self.out.push(' ');
            }
        }

        self.out.push_str(&run.text);
        self.last_y = Some(run.y);
    }

    fn needs_space_before(&self, next: &str) -> bool {
        match (self.out.chars().last(), next.chars().next()) {
            (Some(prev), Some(first)) => {
                !is_cjk(prev) && !is_cjk(first) && prev != ' ' && prev != '\n'
            }
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Lay out one page's runs in the order given.
pub fn layout_page(runs: &[TextRun]) -> String {
    let mut layout = PageLayout::new();
    for run in runs {
        layout.push(run);
    }
    layout.finish()
}

/// CJK punctuation, unified ideographs and full-width forms.
pub fn is_cjk(c: char) -> bool {
    matches!(c, '\u{3000}'..='\u{303F}' | '\u{4E00}'..='\u{9FA5}' | '\u{FF00}'..='\u{FFEF}')
}

/// Marker placed before each page's text.
pub fn page_separator(page_number: usize) -> String {
    format!("\n\n--- Page {page_number} ---\n\n")
}

/// Appended after the last processed page when the document was cut short.
pub fn truncation_notice(shown: usize, total: usize) -> String {
    format!("\n\n--- Showing the first {shown} of {total} pages; remaining pages were not extracted ---\n")
}
