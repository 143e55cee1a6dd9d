/// Top-level error type. Every ingestion call returns this on failure.
///
/// Extraction never partially succeeds: any variant here means the whole
/// document was rejected and nothing should be displayed or paginated.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid {format} container: {detail}")]
    InvalidContainer { format: String, detail: String },

    #[error("EPUB package is missing its {0} section")]
    MissingManifest(String),

    #[error("Document is password protected")]
    PasswordProtected,

    #[error("DRM protected file ({drm_type})")]
    DrmProtected { drm_type: String },

    #[error("Corrupt {format} data: {detail}")]
    CorruptBinary { format: String, detail: String },

    #[error("No readable text found in {0} document")]
    EmptyContent(String),

    #[error("Could not recover readable text from binary file ({chars} printable characters)")]
    UnextractableBinary { chars: usize },

    #[error("Input is {size_mb}MB, exceeding limit of {limit_mb}MB")]
    OversizedInput { size_mb: u64, limit_mb: u64 },

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Security violation: {0}")]
    Security(#[from] SecurityError),
}

impl IngestError {
    /// Stable machine-readable tag for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::UnsupportedFormat(_) => "unsupported_format",
            IngestError::InvalidContainer { .. } => "invalid_container",
            IngestError::MissingManifest(_) => "missing_manifest",
            IngestError::PasswordProtected => "password_protected",
            IngestError::DrmProtected { .. } => "drm_protected",
            IngestError::CorruptBinary { .. } => "corrupt_binary",
            IngestError::EmptyContent(_) => "empty_content",
            IngestError::UnextractableBinary { .. } => "unextractable_binary",
            IngestError::OversizedInput { .. } => "oversized_input",
            IngestError::ExtractionFailed(_) => "extraction_failed",
            IngestError::Security(_) => "security",
        }
    }

    pub(crate) fn invalid_container(format: &str, detail: impl Into<String>) -> Self {
        IngestError::InvalidContainer {
            format: format.to_string(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("Path traversal detected in archive entry: {path}")]
    PathTraversal { path: String },

    #[error("Archive contains {count} files, exceeding limit of {limit}")]
    TooManyFiles { count: u64, limit: u64 },

    #[error("Resource {name} is {size_mb}MB, exceeding limit of {limit_mb}MB")]
    OversizedResource {
        name: String,
        size_mb: u64,
        limit_mb: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oversized_message_states_size() {
        let err = IngestError::OversizedInput {
            size_mb: 72,
            limit_mb: 50,
        };
        assert_eq!(err.to_string(), "Input is 72MB, exceeding limit of 50MB");
        assert_eq!(err.kind(), "oversized_input");
    }

    #[test]
    fn test_security_error_wraps() {
        let err: IngestError = SecurityError::PathTraversal {
            path: "../etc/passwd".into(),
        }
        .into();
        assert_eq!(err.kind(), "security");
        assert!(err.to_string().contains("../etc/passwd"));
    }
}
