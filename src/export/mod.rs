//! Export runs and output formats
//!
//! This module ties schema inference, checkpoints and projection together
//! into export runs, and provides the writers producing the artifacts.
//!
//! # Architecture
//!
//! ```text
//! ExportCoordinator
//!     ├─> DocumentStream (batched documents from the source)
//!     ├─> SavedExport    (tables, columns, transforms, filter)
//!     ├─> ProgressSink   (progress reports)
//!     ├─> ExportCache    (finished artifacts)
//!     └─> ExportWriter   (lifecycle) ─> FormatWriter (csv, xls, xlsx, html, json)
//! ```

pub mod cache;
pub mod coordinator;
pub mod format;
pub mod group;
pub mod progress;
pub mod raw;
pub mod saved;
pub mod streaming;
pub mod writers;

pub use cache::{cache_key, ExportCache, MemoryExportCache};
pub use coordinator::{ExportCoordinator, ExportOptions, ExportOutput, DEFAULT_BATCH_SIZE};
pub use format::Format;
pub use group::{
    export_group, ExportConfiguration, GroupExportConfig, GroupExportReport, RebuildQueue,
    RebuildScheduler,
};
pub use progress::{ProgressSink, ProgressTracker};
pub use raw::{export_from_tables, export_raw};
pub use saved::SavedExport;
pub use streaming::DocumentStream;
pub use writers::{ExportWriter, FormatWriter, TableHeader};
