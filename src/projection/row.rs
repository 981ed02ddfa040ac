//! Cells, synthetic row ids and formatted rows

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

/// Message carried by cells whose transform failed
pub const TRANSFORM_ERROR: &str = "---ERR---";

/// Sentinel placeholder substituted for a cell that could not be computed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    message: String,
}

impl Constant {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The sentinel used for failed transforms
    pub fn transform_error() -> Self {
        Self::new(TRANSFORM_ERROR)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// One output cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    Error(Constant),
}

impl Cell {
    /// Convert a document value into a cell
    ///
    /// Lists and objects end up as compact JSON text.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => Cell::Number(n.clone()),
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// JSON value of the cell; sentinels unwrap to their message
    pub fn to_value(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Number(n) => Value::Number(n.clone()),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Error(constant) => Value::String(constant.message().to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Cell::Error(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Text rendering used by text-based formats (null renders empty)
    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Error(constant) => f.write_str(constant.message()),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Bool(b) => serializer.serialize_bool(*b),
            Cell::Number(n) => n.serialize(serializer),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Error(constant) => serializer.serialize_str(constant.message()),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Cell::Number(Number::from(n))
    }
}

impl From<Constant> for Cell {
    fn from(constant: Constant) -> Self {
        Cell::Error(constant)
    }
}

/// Synthetic row id: primary ordinal followed by repeat indices
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowId(Vec<usize>);

impl RowId {
    /// Id of a document's root row
    pub fn root(primary: usize) -> Self {
        Self(vec![primary])
    }

    pub fn from_components(components: Vec<usize>) -> Self {
        Self(components)
    }

    /// Id of the `index`-th repeat under this row
    pub fn child(&self, index: usize) -> Self {
        let mut components = self.0.clone();
        components.push(index);
        Self(components)
    }

    pub fn primary(&self) -> usize {
        self.0.first().copied().unwrap_or_default()
    }

    pub fn set_primary(&mut self, primary: usize) {
        match self.0.first_mut() {
            Some(first) => *first = primary,
            None => self.0.push(primary),
        }
    }

    pub fn components(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dotted = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&dotted)
    }
}

/// Cells of one output row plus an optional synthetic id
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedRow {
    pub cells: Vec<Cell>,
    pub id: Option<RowId>,
    /// Position the id is re-inserted at by [`FormattedRow::data`]
    pub id_index: usize,
}

impl FormattedRow {
    /// Row without an id (header rows, raw tables)
    pub fn plain(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            id: None,
            id_index: 0,
        }
    }

    pub fn with_id(cells: Vec<Cell>, id: RowId, id_index: usize) -> Self {
        Self {
            cells,
            id: Some(id),
            id_index,
        }
    }

    /// Header row built from plain strings
    pub fn header<S: AsRef<str>>(names: &[S]) -> Self {
        Self::plain(names.iter().map(|n| Cell::from(n.as_ref())).collect())
    }

    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    /// Cells as written, with the id re-inserted
    ///
    /// The id renders as its dotted form; nested ids (more than one
    /// component) are followed by one numeric cell per component.
    pub fn data(&self) -> Vec<Cell> {
        let Some(id) = &self.id else {
            return self.cells.clone();
        };

        let mut id_cells = vec![Cell::Text(id.to_string())];
        if id.len() > 1 {
            id_cells.extend(id.components().iter().map(|&c| Cell::from(c)));
        }

        let at = self.id_index.min(self.cells.len());
        let mut data = Vec::with_capacity(self.cells.len() + id_cells.len());
        data.extend_from_slice(&self.cells[..at]);
        data.extend(id_cells);
        data.extend_from_slice(&self.cells[at..]);
        data
    }
}

/// Header names for an `id` column in a table with `depth` repeat levels
///
/// Nested tables get one extra `<display>__<i>` column per id component.
pub fn id_headers(display: &str, depth: usize) -> Vec<String> {
    let mut headers = vec![display.to_string()];
    if depth > 1 {
        headers.extend((0..depth).map(|i| format!("{display}__{i}")));
    }
    headers
}
