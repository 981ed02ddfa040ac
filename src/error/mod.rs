//! Error handling module for export operations.
//!
//! This module provides the error types shared by every export stage:
//! - Schema conflicts found while unifying documents
//! - Saved-layout mismatches that trigger a schema rebuild
//! - Writer lifecycle violations and format backend failures
//! - Configuration errors
//!
//! Per-cell transform failures have no variant here; narrowing turns them
//! into sentinel cells.
//!
//! # Example
//!
//! ```rust,no_run
//! use docexport::error::{ExportError, Result, SchemaError};
//!
//! fn check(found: bool) -> Result<()> {
//!     if !found {
//!         return Err(SchemaError::Mismatch("table '#' missing".into()).into());
//!     }
//!     Ok(())
//! }
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{ConfigError, ExportError, Result, SchemaError, WriterError};
