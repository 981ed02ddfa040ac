//! Structural schema inference for schema-less documents
//!
//! A [`Schema`] records the shape seen across many documents: which keys
//! appear, where lists occur, and where scalars live. Scalars are
//! type-erased into [`Schema::Leaf`]; only structure matters for flattening.
//!
//! Schemas are built with [`infer`] and grown document by document with
//! [`unify`]. Unification never loses information: a scalar that later turns
//! up as a list becomes a one-element list, and a scalar that later turns up
//! as an object is kept under the empty key (`{"": Leaf}`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;

pub mod flatten;

pub use flatten::{flatten, TableLayout, ID_COLUMN, REPEAT_MARKER};

/// The coarse kind of a value or schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Object,
    List,
    Leaf,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Null => "null",
            Kind::Object => "object",
            Kind::List => "list",
            Kind::Leaf => "scalar",
        };
        f.write_str(name)
    }
}

/// Inferred document shape
///
/// Serializes in the legacy checkpoint shape: `null`, `{...}`, `[element]`
/// and `"string"` for leaves.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub enum Schema {
    #[default]
    Null,
    Object(BTreeMap<String, Schema>),
    List(Box<Schema>),
    Leaf,
}

/// Classify a raw JSON value
///
/// The empty string counts as null, matching how form submissions encode
/// unanswered questions.
pub fn classify(value: &Value) -> Kind {
    match value {
        Value::Null => Kind::Null,
        Value::String(s) if s.is_empty() => Kind::Null,
        Value::Object(_) => Kind::Object,
        Value::Array(_) => Kind::List,
        _ => Kind::Leaf,
    }
}

/// Build a fresh schema for a single value
///
/// Lists fold their elements through [`unify`], so elements whose shapes
/// cannot be reconciled are reported as a conflict naming their path.
pub fn infer(value: &Value) -> Result<Schema, SchemaError> {
    try_infer(value, &mut Vec::new())
}

fn try_infer(value: &Value, path: &mut Vec<String>) -> Result<Schema, SchemaError> {
    match value {
        Value::Object(map) => {
            let mut fields = BTreeMap::new();
            for (key, child) in map {
                path.push(key.clone());
                let schema = try_infer(child, path)?;
                path.pop();
                fields.insert(key.clone(), schema);
            }
            Ok(Schema::Object(fields))
        }
        Value::Array(items) => Schema::unify_list(Schema::Null, items, path),
        other if classify(other) == Kind::Null => Ok(Schema::Null),
        _ => Ok(Schema::Leaf),
    }
}

/// Merge a document into an existing schema
///
/// # Arguments
/// * `schema` - Schema accumulated so far
/// * `value` - Document (or sub-document) to merge
///
/// # Returns
/// * `Result<Schema, SchemaError>` - Widened schema, or a conflict naming the path
pub fn unify(schema: Schema, value: &Value) -> Result<Schema, SchemaError> {
    schema.unify_at(value, &mut Vec::new())
}

impl Schema {
    /// Kind of this schema node
    pub fn kind(&self) -> Kind {
        match self {
            Schema::Null => Kind::Null,
            Schema::Object(_) => Kind::Object,
            Schema::List(_) => Kind::List,
            Schema::Leaf => Kind::Leaf,
        }
    }

    /// Whether nothing has been observed yet
    pub fn is_null(&self) -> bool {
        matches!(self, Schema::Null)
    }

    /// Merge another schema into this one
    ///
    /// Used when a stored schema is combined with one inferred elsewhere;
    /// the other schema is replayed as a representative document.
    pub fn merge(self, other: &Schema) -> Result<Schema, SchemaError> {
        unify(self, &other.to_sample())
    }

    /// Build a representative document with exactly this shape
    fn to_sample(&self) -> Value {
        match self {
            Schema::Null => Value::Null,
            Schema::Leaf => Value::String("string".to_string()),
            Schema::List(element) => Value::Array(match element.as_ref() {
                Schema::Null => Vec::new(),
                other => vec![other.to_sample()],
            }),
            Schema::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, child)| (key.clone(), child.to_sample()))
                    .collect(),
            ),
        }
    }

    fn unify_at(self, value: &Value, path: &mut Vec<String>) -> Result<Schema, SchemaError> {
        let value_kind = classify(value);

        // anything + null => anything
        if value_kind == Kind::Null {
            return Ok(self);
        }
        // null + value => fresh inference
        if self.is_null() {
            return try_infer(value, path);
        }

        match (self, value) {
            (Schema::Leaf, _) if value_kind == Kind::Leaf => Ok(Schema::Leaf),
            (Schema::Object(fields), Value::Object(map)) => {
                Self::unify_object(fields, map.iter(), path)
            }
            (Schema::List(element), Value::Array(items)) => {
                Self::unify_list(*element, items, path)
            }

            // lists and objects never mix, whichever arrives first
            (Schema::List(_), Value::Object(_)) => Err(conflict(path, Kind::List, Kind::Object)),
            (Schema::Object(_), Value::Array(_)) => Err(conflict(path, Kind::Object, Kind::List)),

            // not-list => [not-list] when compared to a list
            (Schema::List(element), single) => {
                Self::unify_list(*element, std::slice::from_ref(single), path)
            }
            (schema, Value::Array(items)) => Self::unify_list(schema, items, path),

            // not-object => {"": not-object} when compared to an object
            (Schema::Object(fields), scalar) => {
                Self::unify_object(fields, std::iter::once((&String::new(), scalar)), path)
            }
            (Schema::Leaf, Value::Object(map)) => {
                let fields = BTreeMap::from([(String::new(), Schema::Leaf)]);
                Self::unify_object(fields, map.iter(), path)
            }

            (schema, _) => Err(conflict(path, schema.kind(), value_kind)),
        }
    }

    fn unify_list(
        element: Schema,
        items: &[Value],
        path: &mut Vec<String>,
    ) -> Result<Schema, SchemaError> {
        path.push(REPEAT_MARKER.to_string());
        let mut merged = element;
        for item in items {
            merged = merged.unify_at(item, path)?;
        }
        path.pop();
        Ok(Schema::List(Box::new(merged)))
    }

    fn unify_object<'a>(
        mut fields: BTreeMap<String, Schema>,
        entries: impl Iterator<Item = (&'a String, &'a Value)>,
        path: &mut Vec<String>,
    ) -> Result<Schema, SchemaError> {
        for (key, child) in entries {
            let existing = fields.remove(key).unwrap_or_default();
            path.push(key.clone());
            let merged = existing.unify_at(child, path)?;
            path.pop();
            fields.insert(key.clone(), merged);
        }
        Ok(Schema::Object(fields))
    }
}

fn conflict(path: &[String], schema: Kind, value: Kind) -> SchemaError {
    SchemaError::Conflict {
        path: path.join("."),
        detail: format!("{schema} schema cannot absorb a {value} value"),
    }
}

impl From<Schema> for Value {
    fn from(schema: Schema) -> Self {
        match schema {
            Schema::Null => Value::Null,
            Schema::Leaf => Value::String("string".to_string()),
            Schema::List(element) => Value::Array(vec![Value::from(*element)]),
            Schema::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(key, child)| (key, Value::from(child)))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<Value> for Schema {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Schema::Null),
            Value::String(_) => Ok(Schema::Leaf),
            Value::Array(mut items) => match items.len() {
                0 => Ok(Schema::List(Box::new(Schema::Null))),
                1 => Ok(Schema::List(Box::new(Schema::try_from(items.remove(0))?))),
                n => Err(format!("list schema must have one element, found {n}")),
            },
            Value::Object(map) => map
                .into_iter()
                .map(|(key, child)| Schema::try_from(child).map(|s| (key, s)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Schema::Object),
            other => Err(format!("invalid schema node: {other}")),
        }
    }
}
