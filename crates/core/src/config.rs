//! Config file parsing for `~/.config/folio/config.toml`.
//!
//! Use `ingest_options_from_config` to turn the loaded config into
//! [`IngestOptions`] so size limits and normalization settings apply.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ingest::IngestOptions;
use crate::paginate::DEFAULT_PAGE_CHAR_BUDGET;
use crate::readers::{ReadOptions, DEFAULT_PDF_PAGE_LIMIT};
use crate::security::SecurityLimits;

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub paginate: PaginateConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub max_input_mb: u64,
    pub pdf_page_limit: usize,
    pub normalize_unicode: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_input_mb: 50,
            pdf_page_limit: DEFAULT_PDF_PAGE_LIMIT,
            normalize_unicode: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginateConfig {
    pub page_char_budget: usize,
}

impl Default for PaginateConfig {
    fn default() -> Self {
        Self {
            page_char_budget: DEFAULT_PAGE_CHAR_BUDGET,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_resource_size_mb: Option<u64>,
}

/// Load config from the default path (`~/.config/folio/config.toml`).
pub fn load_config() -> AppConfig {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => AppConfig::default(),
    }
}

/// Load config from `path`. A missing or malformed file yields the defaults.
pub fn load_config_from(path: &Path) -> AppConfig {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return AppConfig::default(),
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Ignoring malformed config {}: {}", path.display(), e);
            AppConfig::default()
        }
    }
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("folio");
        p.push("config.toml");
        p
    })
}

/// Build security limits from config. Uses defaults for any unset values.
pub fn security_limits_from_config(cfg: &AppConfig) -> SecurityLimits {
    let mut limits = SecurityLimits {
        max_input_bytes: cfg.ingest.max_input_mb.saturating_mul(MB),
        ..SecurityLimits::default()
    };
    if let Some(count) = cfg.security.max_file_count {
        limits.max_file_count = count;
    }
    if let Some(mb) = cfg.security.max_resource_size_mb {
        limits.max_resource_size_bytes = mb.saturating_mul(MB);
    }
    limits
}

/// Build ingestion options from the full app config.
pub fn ingest_options_from_config(cfg: &AppConfig) -> IngestOptions {
    IngestOptions {
        read: ReadOptions {
            security: security_limits_from_config(cfg),
            pdf_page_limit: cfg.ingest.pdf_page_limit.max(1),
        },
        normalize_unicode: cfg.ingest.normalize_unicode,
    }
}

/// Page budget from config, never zero.
pub fn page_char_budget(cfg: &AppConfig) -> usize {
    cfg.paginate.page_char_budget.max(1)
}
