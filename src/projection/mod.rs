//! Document-to-table projection
//!
//! Two stages turn a document into writer rows:
//! 1. [`project_document`] lays the document out over every table of its
//!    schema (the full-width intermediate tables);
//! 2. [`narrow`] selects and orders the configured columns and applies
//!    transforms.
//!
//! Exports without a table configuration skip the second stage and write
//! the intermediate tables as they are.

pub mod config;
pub mod filter;
pub mod names;
pub mod row;
pub mod tables;
pub mod transform;

pub use config::{narrow, ColumnConfig, NarrowContext, TableConfig};
pub use filter::DocumentFilter;
pub use names::UniqueNameGenerator;
pub use row::{Cell, Constant, FormattedRow, RowId};
pub use tables::{project_document, IntermediateTable, ProjectedTable};
pub use transform::{Transform, TransformError, TransformRegistry, TransformSpec};
