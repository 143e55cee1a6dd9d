//! Per-unit progress while a document is being read.
//!
//! Readers report once per decoded PDF page and once per EPUB spine item.
//! The extracted text is still only returned when the whole read finishes.

/// The unit of work a [`ProgressEvent`] counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    PdfPage,
    SpineItem,
}

impl ProgressStage {
    pub fn label(&self) -> &'static str {
        match self {
            ProgressStage::PdfPage => "PDF page",
            ProgressStage::SpineItem => "spine item",
        }
    }
}

/// One unit finished. `current` is 1-based and never exceeds `total`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub current: usize,
    pub total: usize,
    /// Spine idref for EPUB items.
    pub detail: Option<String>,
}

pub trait ProgressHandler: Send {
    fn on_progress(&self, event: ProgressEvent);
}

/// Forwards every event to `tracing` at debug level.
pub struct TracingProgress;

impl ProgressHandler for TracingProgress {
    fn on_progress(&self, event: ProgressEvent) {
        tracing::debug!(
            target: "folio::progress",
            "{} {}/{}{}",
            event.stage.label(),
            event.current,
            event.total,
            event.detail.map(|d| format!(" ({d})")).unwrap_or_default()
        );
    }
}

pub(crate) fn report(
    handler: Option<&dyn ProgressHandler>,
    stage: ProgressStage,
    current: usize,
    total: usize,
    detail: Option<&str>,
) {
    if let Some(h) = handler {
        h.on_progress(ProgressEvent {
            stage,
            current,
            total,
            detail: detail.map(str::to_string),
        });
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingProgress;
    use super::*;

    #[test]
    fn test_report_without_handler_is_silent() {
        report(None, ProgressStage::PdfPage, 1, 1, None);
    }

    #[test]
    fn test_report_delivers_event() {
        let progress = RecordingProgress::default();
        report(Some(&progress), ProgressStage::SpineItem, 2, 5, Some("ch2"));
        assert_eq!(
            progress.snapshot(),
            vec![ProgressEvent {
                stage: ProgressStage::SpineItem,
                current: 2,
                total: 5,
                detail: Some("ch2".into()),
            }]
        );
    }

    #[test]
    fn test_tracing_handler_accepts_events() {
        TracingProgress.on_progress(ProgressEvent {
            stage: ProgressStage::PdfPage,
            current: 1,
            total: 3,
            detail: None,
        });
        assert_eq!(ProgressStage::PdfPage.label(), "PDF page");
    }
}
