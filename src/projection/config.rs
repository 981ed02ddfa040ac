//! User-authored table and column configuration, and narrowing
//!
//! Narrowing picks the configured columns out of the full-width
//! intermediate tables, in configured order, and applies per-column
//! transforms. A failing transform never aborts the row: the cell becomes
//! the `---ERR---` sentinel instead.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::SchemaError;
use crate::schema::flatten::tag_depth;
use crate::schema::ID_COLUMN;

use super::row::{id_headers, Cell, Constant, FormattedRow};
use super::tables::{IntermediateTable, ProjectedTable};
use super::transform::{TransformRegistry, TransformSpec};

/// Source paths with this prefix are never exported
const ATTACHMENTS_PREFIX: &str = "_attachments.";

/// One configured output column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Source column path (`id` selects the synthetic row id)
    pub index: String,
    #[serde(default)]
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformSpec>,
    /// Defaults to `true` when a transform is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sensitive: Option<bool>,
}

impl ColumnConfig {
    pub fn new(index: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            display: display.into(),
            transform: None,
            is_sensitive: None,
        }
    }

    pub fn with_transform(mut self, transform: TransformSpec) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn is_id(&self) -> bool {
        self.index == ID_COLUMN
    }

    pub fn is_sensitive(&self) -> bool {
        self.is_sensitive.unwrap_or(self.transform.is_some())
    }

    /// Header text, marked when the column is sensitive
    pub fn display_name(&self) -> String {
        if self.is_sensitive() {
            format!("{} [sensitive]", self.display)
        } else {
            self.display.clone()
        }
    }
}

/// One configured output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table tag, as produced by flattening (`#` for the root table)
    pub index: String,
    #[serde(default)]
    pub display: String,
    #[serde(default, deserialize_with = "without_attachments")]
    pub columns: Vec<ColumnConfig>,
}

fn without_attachments<'de, D>(deserializer: D) -> Result<Vec<ColumnConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let columns = Vec::<ColumnConfig>::deserialize(deserializer)?;
    Ok(columns
        .into_iter()
        .filter(|c| !c.index.starts_with(ATTACHMENTS_PREFIX))
        .collect())
}

/// Where a configured column reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Id,
    Cell(usize),
}

impl TableConfig {
    pub fn new(index: impl Into<String>, display: impl Into<String>, columns: Vec<ColumnConfig>) -> Self {
        Self {
            index: index.into(),
            display: display.into(),
            columns,
        }
    }

    /// Header row, with the `id` column expanded for nested tables
    pub fn headers_row(&self, separator: &str) -> Vec<String> {
        let depth = tag_depth(&self.index, separator);
        let mut headers = Vec::new();
        for column in &self.columns {
            if column.is_id() {
                headers.extend(id_headers(&column.display_name(), depth));
            } else {
                headers.push(column.display_name());
            }
        }
        headers
    }

    /// Check every configured column against a table's data columns
    ///
    /// # Arguments
    /// * `data_columns` - Column names of the table, without the `id` column
    pub fn check_columns(&self, data_columns: &[String]) -> Result<(), SchemaError> {
        self.resolve(data_columns).map(|_| ())
    }

    fn resolve(&self, data_columns: &[String]) -> Result<Vec<Slot>, SchemaError> {
        self.columns
            .iter()
            .map(|column| {
                if column.is_id() {
                    return Ok(Slot::Id);
                }
                data_columns
                    .iter()
                    .position(|c| *c == column.index)
                    .map(Slot::Cell)
                    .ok_or_else(|| {
                        SchemaError::Mismatch(format!(
                            "column '{}' is not part of table '{}'",
                            column.index, self.index
                        ))
                    })
            })
            .collect()
    }

    /// Narrow one intermediate table down to the configured columns
    pub fn narrow_table(
        &self,
        table: &IntermediateTable,
        doc: &Value,
        ctx: &NarrowContext<'_>,
    ) -> Result<Vec<FormattedRow>, SchemaError> {
        let slots = self.resolve(&table.headers[1..])?;
        let id_index = slots.iter().position(|s| *s == Slot::Id);

        let rows = table
            .rows
            .iter()
            .map(|row| {
                let cells = self
                    .columns
                    .iter()
                    .zip(&slots)
                    .filter_map(|(column, slot)| match slot {
                        Slot::Id => None,
                        Slot::Cell(i) => {
                            let value = row.cells.get(*i).cloned().unwrap_or(Cell::Null);
                            Some(ctx.transform(column, value, doc))
                        }
                    })
                    .collect();
                match (id_index, &row.id) {
                    (Some(at), Some(id)) => FormattedRow::with_id(cells, id.clone(), at),
                    _ => FormattedRow::plain(cells),
                }
            })
            .collect();
        Ok(rows)
    }
}

/// Transform settings shared by one narrowing pass
#[derive(Debug, Clone, Copy)]
pub struct NarrowContext<'a> {
    pub registry: &'a TransformRegistry,
    /// Fallback for columns without their own transform
    pub global_transform: Option<&'a TransformSpec>,
    pub apply_transforms: bool,
}

impl<'a> NarrowContext<'a> {
    pub fn new(registry: &'a TransformRegistry) -> Self {
        Self {
            registry,
            global_transform: None,
            apply_transforms: true,
        }
    }

    fn transform(&self, column: &ColumnConfig, value: Cell, doc: &Value) -> Cell {
        if !self.apply_transforms {
            return value;
        }
        let spec = match (&column.transform, self.global_transform) {
            (Some(_), _) if value.is_error() => return value,
            (Some(spec), _) => spec,
            (None, Some(global)) => global,
            (None, None) => return value,
        };
        match self.registry.apply(spec, &value, doc) {
            Ok(transformed) => transformed,
            Err(e) => {
                debug!("Transform '{}' failed on column '{}': {}", spec.name, column.index, e);
                Cell::Error(Constant::transform_error())
            }
        }
    }
}

/// Narrow a document's intermediate tables through the table configuration
///
/// # Returns
/// * `Result<Vec<ProjectedTable>, SchemaError>` - One table per configuration,
///   or a mismatch when a configured table or column is not in the layout
pub fn narrow(
    tables: &[IntermediateTable],
    configs: &[TableConfig],
    doc: &Value,
    ctx: &NarrowContext<'_>,
) -> Result<Vec<ProjectedTable>, SchemaError> {
    configs
        .iter()
        .map(|config| {
            let table = tables
                .iter()
                .find(|t| t.tag == config.index)
                .ok_or_else(|| SchemaError::Mismatch(format!("table '{}' is not in the schema", config.index)))?;
            Ok(ProjectedTable {
                tag: config.index.clone(),
                rows: config.narrow_table(table, doc, ctx)?,
            })
        })
        .collect()
}
