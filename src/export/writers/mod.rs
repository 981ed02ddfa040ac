//! Format writers for export operations
//!
//! Every format shares one lifecycle, enforced by [`ExportWriter`]:
//!
//! ```text
//! open(headers, titles) -> add_table* -> write* -> close
//! ```
//!
//! [`ExportWriter`] owns the format-independent parts: unique and cleaned
//! table titles, deduplicated headers, and renumbering the primary
//! component of row ids so each written document gets the next small
//! integer. A [`FormatWriter`] backend only turns rows into an artifact.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, WriterError};
use crate::projection::{Cell, FormattedRow, ProjectedTable, UniqueNameGenerator};

pub mod csv;
pub mod excel;
pub mod html;
pub mod json;
mod scratch;

pub use self::csv::{CsvArchiveWriter, SingleCsvWriter};
pub use excel::{LegacyWorkbookWriter, WorkbookWriter};
pub use html::{DefaultHtmlRenderer, HtmlArchiveWriter, HtmlWriter, Section, SectionRenderer};
pub use json::JsonWriter;

/// Table-name cap for formats without a stricter limit
pub const DEFAULT_MAX_TABLE_NAME_SIZE: usize = 500;

/// Header row of one table, keyed by table tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeader {
    pub tag: String,
    pub headers: Vec<String>,
}

impl TableHeader {
    pub fn new(tag: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            tag: tag.into(),
            headers,
        }
    }
}

/// Format-specific output backend
#[async_trait]
pub trait FormatWriter: Send {
    /// Longest table title the format accepts
    fn max_table_name_size(&self) -> usize {
        DEFAULT_MAX_TABLE_NAME_SIZE
    }

    /// Start a table
    ///
    /// # Arguments
    /// * `tag` - Table tag rows will be addressed by
    /// * `title` - Unique, cleaned table title
    async fn init_table(&mut self, tag: &str, title: &str) -> Result<()>;

    /// Append one row (the header row comes first) to a started table
    async fn write_row(&mut self, tag: &str, row: &[Cell]) -> Result<()>;

    /// Finalize the artifact and release scratch resources
    ///
    /// # Returns
    /// * `Result<Vec<u8>>` - Bytes of the finished artifact
    async fn finish(&mut self) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Open,
    Closed,
}

/// Lifecycle-checked writer wrapping a format backend
pub struct ExportWriter {
    backend: Box<dyn FormatWriter>,
    state: Lifecycle,
    current_primary_id: usize,
    max_column_size: usize,
    table_names: UniqueNameGenerator,
    tables: HashSet<String>,
}

impl ExportWriter {
    pub fn new(backend: Box<dyn FormatWriter>) -> Self {
        let cap = backend.max_table_name_size();
        Self {
            backend,
            state: Lifecycle::Created,
            current_primary_id: 0,
            max_column_size: crate::projection::names::DEFAULT_MAX_COLUMN_SIZE,
            table_names: UniqueNameGenerator::new(Some(cap)),
            tables: HashSet::new(),
        }
    }

    /// Open the writer and add every table in `headers`
    ///
    /// # Arguments
    /// * `headers` - Header rows per table, in output order
    /// * `titles` - Title overrides by table tag
    /// * `max_column_size` - Cap for header names
    pub async fn open(
        &mut self,
        headers: &[TableHeader],
        titles: &HashMap<String, String>,
        max_column_size: usize,
    ) -> Result<()> {
        match self.state {
            Lifecycle::Created => {}
            Lifecycle::Open => return Err(WriterError::AlreadyOpen.into()),
            Lifecycle::Closed => return Err(WriterError::Closed.into()),
        }
        self.state = Lifecycle::Open;
        self.max_column_size = max_column_size;

        for table in headers {
            let title = titles.get(&table.tag).map(String::as_str);
            self.add_table(&table.tag, &table.headers, title).await?;
        }
        Ok(())
    }

    /// Add a table and write its (deduplicated) header row
    pub async fn add_table(&mut self, tag: &str, headers: &[String], title: Option<&str>) -> Result<()> {
        self.ensure_open()?;

        let title = self.table_names.next_unique(&clean_name(title.unwrap_or(tag)));
        let mut columns = UniqueNameGenerator::new(Some(self.max_column_size));
        let header_row = FormattedRow::header(
            &headers
                .iter()
                .map(|h| columns.next_unique(h))
                .collect::<Vec<_>>(),
        );

        self.backend.init_table(tag, &title).await?;
        self.tables.insert(tag.to_string());
        self.backend.write_row(tag, &header_row.data()).await?;
        debug!("Added table {} as '{}' ({} columns)", tag, title, headers.len());
        Ok(())
    }

    /// Write the tables of one document
    ///
    /// Row ids get the writer's document counter as primary component; the
    /// counter moves on once per call.
    pub async fn write(&mut self, tables: Vec<ProjectedTable>) -> Result<()> {
        self.ensure_open()?;

        for table in tables {
            if !self.tables.contains(&table.tag) {
                return Err(WriterError::UnknownTable(table.tag).into());
            }
            for mut row in table.rows {
                if let Some(id) = row.id.as_mut() {
                    id.set_primary(self.current_primary_id);
                }
                self.backend.write_row(&table.tag, &row.data()).await?;
            }
        }

        self.current_primary_id += 1;
        Ok(())
    }

    /// Finish the artifact
    pub async fn close(&mut self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.state = Lifecycle::Closed;
        let bytes = self.backend.finish().await?;
        debug!(
            "Closed writer after {} documents ({} bytes)",
            self.current_primary_id,
            bytes.len()
        );
        Ok(bytes)
    }

    /// Number of `write` calls so far
    pub fn documents_written(&self) -> usize {
        self.current_primary_id
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            Lifecycle::Open => Ok(()),
            Lifecycle::Created => Err(WriterError::NotOpen.into()),
            Lifecycle::Closed => Err(WriterError::Closed.into()),
        }
    }
}

/// Strip characters spreadsheet and archive names reject
fn clean_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '\n')
        .map(|c| match c {
            '[' | ']' | '\\' | '?' | '*' | '/' | ':' => '-',
            other => other,
        })
        .collect()
}
