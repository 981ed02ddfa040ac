//! Exports of caller-supplied tables
//!
//! No schema and no checkpoint: the caller hands over finished rows and gets
//! the artifact back.

use std::collections::HashMap;

use crate::error::Result;
use crate::projection::names::DEFAULT_MAX_COLUMN_SIZE;
use crate::projection::{Cell, FormattedRow, ProjectedTable};

use super::format::Format;
use super::writers::TableHeader;

/// Write already projected tables
///
/// # Arguments
/// * `headers` - Header rows, one per table, in output order
/// * `tables` - Rows per table; each entry is written as one document
/// * `format` - Output format
/// * `max_column_size` - Cap for header names
pub async fn export_raw(
    headers: &[TableHeader],
    tables: Vec<ProjectedTable>,
    format: Format,
    max_column_size: usize,
) -> Result<Vec<u8>> {
    let mut writer = format.writer();
    writer.open(headers, &HashMap::new(), max_column_size).await?;
    for table in tables {
        writer.write(vec![table]).await?;
    }
    writer.close().await
}

/// Write `(title, rows)` pairs; the first row of each table is its header
pub async fn export_from_tables(tables: Vec<(String, Vec<Vec<Cell>>)>, format: Format) -> Result<Vec<u8>> {
    let mut headers = Vec::with_capacity(tables.len());
    let mut bodies = Vec::with_capacity(tables.len());
    for (title, rows) in tables {
        let mut rows = rows.into_iter();
        let header = rows
            .next()
            .map(|row| row.iter().map(Cell::text).collect())
            .unwrap_or_default();
        headers.push(TableHeader::new(title.clone(), header));
        bodies.push(ProjectedTable {
            tag: title,
            rows: rows.map(FormattedRow::plain).collect(),
        });
    }
    export_raw(&headers, bodies, format, DEFAULT_MAX_COLUMN_SIZE).await
}
