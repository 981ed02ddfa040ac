//! Incremental tabular exports of schema-less documents
//!
//! This library infers a structural schema from JSON documents, tracks
//! export progress with checkpoints, projects documents into flat tables and
//! writes them in several formats.
//!
//! # Modules
//!
//! - `schema`: Schema inference, unification and flattening
//! - `checkpoint`: Checkpoints, cursors and the checkpoint ledger
//! - `projection`: Intermediate tables, table configuration and transforms
//! - `export`: Export runs, saved exports and format writers
//! - `source`: Document source trait and the in-process store
//! - `config`: Configuration management
//! - `cli`: Command-line interface
//! - `error`: Error types and handling
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use docexport::checkpoint::{CheckpointLedger, ExportIndex};
//! use docexport::export::{ExportCoordinator, Format, SavedExport};
//! use docexport::source::MemoryDocumentStore;
//!
//! #[tokio::main]
//! async fn main() -> docexport::Result<()> {
//!     let source = Arc::new(MemoryDocumentStore::load_jsonl("docs.jsonl").await?);
//!     let ledger = Arc::new(CheckpointLedger::open("ledger.json").await?);
//!     let coordinator = ExportCoordinator::new(source, ledger);
//!
//!     let saved = SavedExport::default_for(ExportIndex::new(["visit"]));
//!     if let Some(output) = coordinator.export(&saved, Format::Csv, None, 2000).await? {
//!         std::fs::write("visit.zip", &output.bytes)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod projection;
pub mod schema;
pub mod source;

// Re-export commonly used types
pub use checkpoint::{Checkpoint, Cursor, ExportIndex};
pub use config::Config;
pub use error::{ExportError, Result};
pub use export::{ExportCoordinator, ExportOutput, Format, SavedExport};
pub use schema::Schema;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
