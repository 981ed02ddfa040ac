//! Projecting a document onto the tables of a schema
//!
//! The result is the intermediate, full-width table set: one table per
//! flattened tag, columns exactly as [`flatten`] lays them out. The root
//! table holds one row per document; every list table holds one row per list
//! element, with a [`RowId`] pointing back at its parent row.

use std::collections::HashMap;

use serde_json::Value;

use crate::schema::flatten::table_tag;
use crate::schema::{flatten, Schema, REPEAT_MARKER};

use super::row::{Cell, FormattedRow, RowId};

/// Full-width rows for one table tag
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateTable {
    pub tag: String,
    /// Header row from the schema, `id` first
    pub headers: Vec<String>,
    pub rows: Vec<FormattedRow>,
}

/// Rows ready for a writer
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedTable {
    pub tag: String,
    pub rows: Vec<FormattedRow>,
}

impl From<IntermediateTable> for ProjectedTable {
    fn from(table: IntermediateTable) -> Self {
        Self {
            tag: table.tag,
            rows: table.rows,
        }
    }
}

/// Project one document onto every table of `schema`
///
/// # Arguments
/// * `doc` - Source document
/// * `schema` - Schema the document was unified into
/// * `separator` - Path separator used for tags and column names
///
/// # Returns
/// * `Vec<IntermediateTable>` - Tables in flattening order; list tables may be empty
pub fn project_document(doc: &Value, schema: &Schema, separator: &str) -> Vec<IntermediateTable> {
    let mut tables: Vec<IntermediateTable> = flatten(schema, separator)
        .into_iter()
        .map(|layout| IntermediateTable {
            tag: layout.tag,
            headers: layout.headers,
            rows: Vec::new(),
        })
        .collect();

    let positions: HashMap<String, usize> = tables
        .iter()
        .enumerate()
        .map(|(i, table)| (table.tag.clone(), i))
        .collect();

    let mut projector = Projector {
        separator,
        positions: &positions,
        rows: vec![Vec::new(); tables.len()],
    };

    let root_id = RowId::root(0);
    let mut cells = Vec::new();
    projector.fill(schema, Some(doc), &mut Vec::new(), &root_id, &mut cells);
    projector.rows[0].push(FormattedRow::with_id(cells, root_id, 0));

    for (table, rows) in tables.iter_mut().zip(projector.rows) {
        table.rows = rows;
    }
    tables
}

struct Projector<'a> {
    separator: &'a str,
    positions: &'a HashMap<String, usize>,
    rows: Vec<Vec<FormattedRow>>,
}

impl Projector<'_> {
    /// Append the cells of `schema` (one row's worth) to `cells`, pushing
    /// rows of nested list tables as they are found
    fn fill(
        &mut self,
        schema: &Schema,
        value: Option<&Value>,
        path: &mut Vec<String>,
        row_id: &RowId,
        cells: &mut Vec<Cell>,
    ) {
        match schema {
            Schema::Null if path.is_empty() => {}
            Schema::Null | Schema::Leaf => cells.push(value.map(Cell::from_value).unwrap_or(Cell::Null)),
            Schema::Object(fields) => {
                for (key, child) in fields {
                    let child_value = match value {
                        Some(Value::Object(map)) => map.get(key),
                        // a scalar coerced into an object lives under ""
                        Some(other) if key.is_empty() && !other.is_null() => Some(other),
                        _ => None,
                    };
                    path.push(key.clone());
                    self.fill(child, child_value, path, row_id, cells);
                    path.pop();
                }
            }
            Schema::List(element) => {
                let items: Vec<&Value> = match value {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::String(s)) if s.is_empty() => Vec::new(),
                    Some(Value::Array(items)) => items.iter().collect(),
                    Some(single) => vec![single],
                };
                let Some(&table) = self.positions.get(&table_tag(path, self.separator)) else {
                    return;
                };

                path.push(REPEAT_MARKER.to_string());
                for (i, item) in items.into_iter().enumerate() {
                    let child_id = row_id.child(i);
                    let mut child_cells = Vec::new();
                    self.fill(element, Some(item), path, &child_id, &mut child_cells);
                    self.rows[table].push(FormattedRow::with_id(child_cells, child_id, 0));
                }
                path.pop();
            }
        }
    }
}
