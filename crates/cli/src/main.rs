use clap::{Parser, Subcommand};
use std::path::Path;

use folio_core::config::{
    config_path, ingest_options_from_config, load_config, page_char_budget, AppConfig,
};
use folio_core::document::{ExtractedText, Pagination, SourceDocument};
use folio_core::error::IngestError;
use folio_core::ingest::ingest;
use folio_core::paginate::paginate;
use folio_core::progress::TracingProgress;
use folio_core::stats::TextStats;

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Extract, paginate and index TXT, Markdown, PDF, EPUB and MOBI documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the extracted plain text of a document
    Extract {
        /// Input file
        #[arg(required = true)]
        input: String,

        /// Declared mime type (application/pdf overrides the extension)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Split a document into fixed-budget pages
    Paginate {
        /// Input file
        #[arg(required = true)]
        input: String,

        /// Characters per page (defaults to the configured budget)
        #[arg(long)]
        budget: Option<usize>,

        /// Print only this page (1-based)
        #[arg(long)]
        page: Option<usize>,
    },

    /// Print the table of contents derived from headings
    Toc {
        /// Input file
        #[arg(required = true)]
        input: String,

        /// Characters per page (defaults to the configured budget)
        #[arg(long)]
        budget: Option<usize>,
    },

    /// Show format, title, warnings and reading statistics
    Info {
        /// Input file
        #[arg(required = true)]
        input: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize default config file
    Init,
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Key (dot-separated path, e.g. paginate.page_char_budget)
        key: String,
        /// Value
        value: String,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cfg = load_config();

    let result = match &cli.command {
        Commands::Extract { input, mime } => run_extract(input, mime.as_deref(), &cfg, cli.json),
        Commands::Paginate { input, budget, page } => run_paginate(input, *budget, *page, &cfg, cli.json),
        Commands::Toc { input, budget } => run_toc(input, *budget, &cfg, cli.json),
        Commands::Info { input } => run_info(input, &cfg, cli.json),
        Commands::Config { action } => run_config(action, &cfg, cli.json),
    };

    if let Err(e) = result {
        match e.downcast_ref::<IngestError>() {
            Some(ingest_err) if cli.json => {
                let report = serde_json::json!({
                    "error": ingest_err.kind(),
                    "message": ingest_err.to_string(),
                });
                eprintln!("{}", report);
            }
            _ => eprintln!("Error: {}", e),
        }
        std::process::exit(1);
    }
}

/// Read `input` from disk and run it through the ingestion pipeline.
fn ingest_file(
    input: &str,
    mime: Option<&str>,
    cfg: &AppConfig,
) -> Result<ExtractedText, Box<dyn std::error::Error + Send + Sync>> {
    let path = Path::new(input);
    let bytes = std::fs::read(path).map_err(|e| format!("Cannot read {}: {}", input, e))?;
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or(input);

    let source = SourceDocument::new(&bytes, name, mime);
    let extracted = ingest(&source, &ingest_options_from_config(cfg), Some(&TracingProgress))?;
    Ok(extracted)
}

fn paginate_file(
    input: &str,
    budget: Option<usize>,
    cfg: &AppConfig,
) -> Result<(ExtractedText, Pagination), Box<dyn std::error::Error + Send + Sync>> {
    let extracted = ingest_file(input, None, cfg)?;
    let budget = budget.unwrap_or_else(|| page_char_budget(cfg)).max(1);
    let pagination = paginate(&extracted.text, budget);
    Ok((extracted, pagination))
}

fn print_warnings(extracted: &ExtractedText) {
    for w in &extracted.warnings {
        eprintln!("warning: {}", w);
    }
}

fn run_extract(input: &str, mime: Option<&str>, cfg: &AppConfig, json: bool) -> CliResult {
    let extracted = ingest_file(input, mime, cfg)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&extracted)?);
    } else {
        print_warnings(&extracted);
        print!("{}", extracted.text);
        if !extracted.text.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

fn run_paginate(
    input: &str,
    budget: Option<usize>,
    page: Option<usize>,
    cfg: &AppConfig,
    json: bool,
) -> CliResult {
    let (extracted, pagination) = paginate_file(input, budget, cfg)?;

    match page {
        Some(ordinal) => {
            let p = pagination.page(ordinal).ok_or_else(|| {
                format!("Page {} out of range (1-{})", ordinal, pagination.len())
            })?;
            if json {
                println!("{}", serde_json::to_string_pretty(p)?);
            } else {
                print!("{}", p.content);
                if !p.content.ends_with('\n') {
                    println!();
                }
            }
        }
        None => {
            if json {
                println!("{}", serde_json::to_string_pretty(&pagination)?);
            } else {
                print_warnings(&extracted);
                println!("Pages: {}", pagination.len());
                println!("TOC entries: {}", pagination.toc.len());
            }
        }
    }
    Ok(())
}

fn run_toc(input: &str, budget: Option<usize>, cfg: &AppConfig, json: bool) -> CliResult {
    let (_, pagination) = paginate_file(input, budget, cfg)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pagination.toc)?);
    } else if pagination.toc.is_empty() {
        println!("No headings found");
    } else {
        for entry in &pagination.toc {
            let indent = "  ".repeat(usize::from(entry.level.saturating_sub(1)));
            println!("{}{} ... p.{}", indent, entry.title, entry.page_index + 1);
        }
    }
    Ok(())
}

fn run_info(input: &str, cfg: &AppConfig, json: bool) -> CliResult {
    let extracted = ingest_file(input, None, cfg)?;
    let stats = TextStats::of(&extracted.text);
    let pages = paginate(&extracted.text, page_char_budget(cfg)).len();

    if json {
        let info = serde_json::json!({
            "format": extracted.format,
            "title": extracted.title,
            "warnings": extracted.warnings,
            "stats": stats,
            "pages": pages,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Format: {}", extracted.format);
        if let Some(t) = &extracted.title {
            println!("Title: {}", t);
        }
        println!("Characters: {}", stats.character_count);
        println!("Words: {}", stats.word_count);
        println!("Lines: {}", stats.line_count);
        println!("Pages: {}", pages);
        println!("Reading time: {:.1} min", stats.estimated_reading_time_minutes);
        if !extracted.warnings.is_empty() {
            println!("Warnings:");
            for w in &extracted.warnings {
                println!("  - {}", w);
            }
        }
    }
    Ok(())
}

fn run_config(action: &ConfigAction, cfg: &AppConfig, json: bool) -> CliResult {
    match action {
        ConfigAction::Init => {
            let path = config_path().ok_or("Could not determine config directory")?;
            write_config(&path, &AppConfig::default())?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            if json {
                println!("{}", serde_json::to_string_pretty(cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(cfg)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path().ok_or("Could not determine config directory")?;
            let mut updated = cfg.clone();
            set_config_key(&mut updated, key, value)?;
            write_config(&path, &updated)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}

fn write_config(path: &Path, cfg: &AppConfig) -> CliResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

fn set_config_key(cfg: &mut AppConfig, key: &str, value: &str) -> CliResult {
    let invalid = || format!("Invalid value for {}: {}", key, value);
    let parts: Vec<&str> = key.splitn(2, '.').collect();
    match parts.as_slice() {
        ["ingest", sub] => match *sub {
            "max_input_mb" => cfg.ingest.max_input_mb = value.parse().map_err(|_| invalid())?,
            "pdf_page_limit" => cfg.ingest.pdf_page_limit = value.parse().map_err(|_| invalid())?,
            "normalize_unicode" => {
                cfg.ingest.normalize_unicode = value.parse().map_err(|_| invalid())?
            }
            _ => return Err(format!("Unknown key: {}", key).into()),
        },
        ["paginate", "page_char_budget"] => {
            cfg.paginate.page_char_budget = value.parse().map_err(|_| invalid())?
        }
        ["security", sub] => match *sub {
            "max_file_count" => cfg.security.max_file_count = Some(value.parse().map_err(|_| invalid())?),
            "max_resource_size_mb" => {
                cfg.security.max_resource_size_mb = Some(value.parse().map_err(|_| invalid())?)
            }
            _ => return Err(format!("Unknown key: {}", key).into()),
        },
        _ => return Err(format!("Unknown key: {}", key).into()),
    }
    Ok(())
}
