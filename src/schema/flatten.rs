//! Flattening a schema into table layouts
//!
//! Every object path becomes a column; every list boundary starts a new
//! table whose tag is the list's path wrapped in repeat markers, e.g.
//! `#.form.items.#`. The root table is tagged `#`.

use super::Schema;

/// Synthetic id column present at the start of every table
pub const ID_COLUMN: &str = "id";

/// Path segment marking a list boundary
pub const REPEAT_MARKER: &str = "#";

/// Columns of one flattened table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    /// Table tag (`#` for the root table)
    pub tag: String,
    /// Header row, `id` first
    pub headers: Vec<String>,
}

impl TableLayout {
    fn new(tag: String) -> Self {
        Self {
            tag,
            headers: vec![ID_COLUMN.to_string()],
        }
    }

    /// Data columns, without the leading `id`
    pub fn columns(&self) -> &[String] {
        &self.headers[1..]
    }
}

/// Flatten a schema depth-first into tables
///
/// # Arguments
/// * `schema` - Schema to flatten
/// * `separator` - String joining path segments in tags and column names
///
/// # Returns
/// * `Vec<TableLayout>` - Root table first, then nested tables in discovery order
pub fn flatten(schema: &Schema, separator: &str) -> Vec<TableLayout> {
    let mut tables = vec![TableLayout::new(REPEAT_MARKER.to_string())];
    walk(schema, &mut Vec::new(), 0, separator, &mut tables);
    tables
}

fn walk(
    schema: &Schema,
    path: &mut Vec<String>,
    table: usize,
    separator: &str,
    tables: &mut Vec<TableLayout>,
) {
    match schema {
        Schema::Null if path.is_empty() => {}
        Schema::Null | Schema::Leaf => tables[table].headers.push(column_name(path, separator)),
        Schema::Object(fields) => {
            for (key, child) in fields {
                path.push(key.clone());
                walk(child, path, table, separator, tables);
                path.pop();
            }
        }
        Schema::List(element) => {
            tables.push(TableLayout::new(table_tag(path, separator)));
            let child = tables.len() - 1;
            path.push(REPEAT_MARKER.to_string());
            walk(element, path, child, separator, tables);
            path.pop();
        }
    }
}

/// Column name for a path; empty segments (coerced scalars) are skipped
pub fn column_name(path: &[String], separator: &str) -> String {
    path.iter()
        .filter(|segment| !segment.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Tag of the table started by a list at `path`
pub fn table_tag(path: &[String], separator: &str) -> String {
    std::iter::once(REPEAT_MARKER)
        .chain(path.iter().filter(|s| !s.is_empty()).map(String::as_str))
        .chain(std::iter::once(REPEAT_MARKER))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Number of repeat levels a table tag spans (1 for the root table)
pub fn tag_depth(tag: &str, separator: &str) -> usize {
    tag.split(separator)
        .filter(|segment| *segment == REPEAT_MARKER)
        .count()
        .max(1)
}
