//! Resource ceilings and archive hardening: input size cap, path traversal
//! guards, entry count/size limits, EPUB DRM detection.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{IngestError, SecurityError};

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityLimits {
    /// Inputs larger than this are rejected before any extractor runs.
    pub max_input_bytes: u64,
    /// Maximum number of entries allowed in an archive.
    pub max_file_count: u64,
    /// Maximum decompressed size of a single archive entry.
    pub max_resource_size_bytes: u64,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: 50 * MB,
            max_file_count: 10_000,
            max_resource_size_bytes: 200 * MB,
        }
    }
}

/// Reject inputs over the configured byte ceiling.
pub fn check_input_size(len: usize, limits: &SecurityLimits) -> Result<(), IngestError> {
    let len = len as u64;
    if len > limits.max_input_bytes {
        return Err(IngestError::OversizedInput {
            size_mb: len.div_ceil(MB),
            limit_mb: limits.max_input_bytes / MB,
        });
    }
    Ok(())
}

/// Check an archive entry path for traversal out of the archive root.
pub fn check_path_traversal(entry_path: &str) -> Result<(), SecurityError> {
    if entry_path.starts_with('/') || entry_path.starts_with('\\') {
        return Err(SecurityError::PathTraversal {
            path: entry_path.to_string(),
        });
    }

    // Windows drive prefix (e.g. C:\)
    if entry_path.len() >= 2 && entry_path.as_bytes()[1] == b':' {
        return Err(SecurityError::PathTraversal {
            path: entry_path.to_string(),
        });
    }

    if Path::new(entry_path)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(SecurityError::PathTraversal {
            path: entry_path.to_string(),
        });
    }

    Ok(())
}

pub fn check_file_count(count: u64, limits: &SecurityLimits) -> Result<(), SecurityError> {
    if count > limits.max_file_count {
        return Err(SecurityError::TooManyFiles {
            count,
            limit: limits.max_file_count,
        });
    }
    Ok(())
}

pub fn check_resource_size(
    name: &str,
    size_bytes: u64,
    limits: &SecurityLimits,
) -> Result<(), SecurityError> {
    if size_bytes > limits.max_resource_size_bytes {
        return Err(SecurityError::OversizedResource {
            name: name.to_string(),
            size_mb: size_bytes / MB,
            limit_mb: limits.max_resource_size_bytes / MB,
        });
    }
    Ok(())
}

/// Inspect an EPUB's `META-INF/encryption.xml`. Font obfuscation is allowed;
/// anything else that encrypts content is treated as DRM.
pub fn check_epub_drm(encryption_xml: &str) -> Result<(), IngestError> {
    let drm_type = if encryption_xml.contains("http://ns.adobe.com/adept")
        || encryption_xml.contains("http://ns.adobe.com/digitaleditions")
    {
        Some("Adobe DRM")
    } else if encryption_xml.contains("http://www.apple.com/ibooks") {
        Some("Apple FairPlay")
    } else if encryption_xml.contains("http://urms.org") {
        Some("Sony URMS")
    } else if encryption_xml.contains("EncryptedData")
        && !encryption_xml.contains("http://www.idpf.org/2008/embedding")
        && !encryption_xml.contains("http://ns.adobe.com/pdf/enc#RC")
    {
        Some("Unknown DRM")
    } else {
        None
    };

    match drm_type {
        Some(drm_type) => Err(IngestError::DrmProtected {
            drm_type: drm_type.to_string(),
        }),
        None => Ok(()),
    }
}
