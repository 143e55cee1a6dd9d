pub mod config;
pub mod detect;
pub mod document;
pub mod encoding;
pub mod error;
pub mod heading;
pub mod ingest;
pub mod paginate;
pub mod progress;
pub mod readers;
pub mod security;
pub mod stats;

pub use ingest::{ingest, ingest_bytes, IngestOptions};
pub use paginate::paginate;

pub mod prelude {
    pub use crate::detect::Format;
    pub use crate::document::*;
    pub use crate::error::*;
    pub use crate::ingest::{ingest, ingest_bytes, IngestOptions};
    pub use crate::paginate::paginate;
}
