//! Per-cell transforms
//!
//! Transforms are data, not code: a [`TransformSpec`] names a transform and
//! carries its parameters, and a [`TransformRegistry`] resolves the name when
//! an export runs. Every transform has the contract
//! `(value, source document, params) -> value` and may fail.
//!
//! Built-in transforms:
//! - `identity`: value unchanged
//! - `hash`: hex BLAKE3 digest of the value, with an optional `salt`
//! - `date`: re-format a date or timestamp with the `format` param
//! - `lookup`: map the value through the `values` object, optional `default`
//! - `truncate`: keep the first `length` characters

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::row::Cell;

/// Serializable reference to a registered transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl TransformSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Value::Null,
        }
    }

    pub fn with_params(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// Failure of a single transform invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError(String);

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TransformError {}

/// A value transform
pub trait Transform: Send + Sync {
    fn apply(&self, value: &Cell, doc: &Value, params: &Value) -> Result<Cell, TransformError>;
}

impl<F> Transform for F
where
    F: Fn(&Cell, &Value, &Value) -> Result<Cell, TransformError> + Send + Sync,
{
    fn apply(&self, value: &Cell, doc: &Value, params: &Value) -> Result<Cell, TransformError> {
        self(value, doc, params)
    }
}

/// Name to transform mapping
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, Arc<dyn Transform>>,
}

impl TransformRegistry {
    /// Registry without any transforms
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Registry holding the built-in transforms
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("identity", identity);
        registry.register("hash", hash);
        registry.register("date", date);
        registry.register("lookup", lookup);
        registry.register("truncate", truncate);
        registry
    }

    /// Register (or replace) a transform under `name`
    pub fn register<T: Transform + 'static>(&mut self, name: &str, transform: T) {
        self.transforms.insert(name.to_string(), Arc::new(transform));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Resolve and run `spec`
    pub fn apply(&self, spec: &TransformSpec, value: &Cell, doc: &Value) -> Result<Cell, TransformError> {
        let transform = self
            .transforms
            .get(&spec.name)
            .ok_or_else(|| TransformError::new(format!("unknown transform '{}'", spec.name)))?;
        transform.apply(value, doc, &spec.params)
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.transforms.keys().collect();
        names.sort();
        f.debug_struct("TransformRegistry").field("transforms", &names).finish()
    }
}

fn param_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn identity(value: &Cell, _doc: &Value, _params: &Value) -> Result<Cell, TransformError> {
    Ok(value.clone())
}

fn hash(value: &Cell, _doc: &Value, params: &Value) -> Result<Cell, TransformError> {
    if value.is_null() {
        return Ok(Cell::Null);
    }
    let salt = param_str(params, "salt").unwrap_or_default();
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(value.text().as_bytes());
    Ok(Cell::Text(hasher.finalize().to_hex().to_string()))
}

fn date(value: &Cell, _doc: &Value, params: &Value) -> Result<Cell, TransformError> {
    if value.is_null() {
        return Ok(Cell::Null);
    }
    let format = param_str(params, "format").unwrap_or("%Y-%m-%d");
    let raw = value.text();
    let raw = raw.trim();

    let mut rendered = String::new();
    let written = if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        write!(rendered, "{}", parsed.format(format))
    } else if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        write!(rendered, "{}", parsed.format(format))
    } else if let Ok(parsed) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        write!(rendered, "{}", parsed.format(format))
    } else {
        return Err(TransformError::new(format!("not a date: {raw}")));
    };
    written.map_err(|_| TransformError::new(format!("invalid date format '{format}'")))?;
    Ok(Cell::Text(rendered))
}

fn lookup(value: &Cell, _doc: &Value, params: &Value) -> Result<Cell, TransformError> {
    let key = value.text();
    if let Some(mapped) = params.get("values").and_then(|values| values.get(&key)) {
        return Ok(Cell::from_value(mapped));
    }
    match params.get("default") {
        Some(default) => Ok(Cell::from_value(default)),
        None => Err(TransformError::new(format!("no lookup value for '{key}'"))),
    }
}

fn truncate(value: &Cell, _doc: &Value, params: &Value) -> Result<Cell, TransformError> {
    let length = params
        .get("length")
        .and_then(Value::as_u64)
        .ok_or_else(|| TransformError::new("truncate requires a numeric 'length'"))?;
    match value {
        Cell::Text(s) => Ok(Cell::Text(s.chars().take(length as usize).collect())),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(spec: TransformSpec, value: Cell) -> Result<Cell, TransformError> {
        TransformRegistry::default().apply(&spec, &value, &json!({}))
    }

    #[test]
    fn test_hash_is_salted_and_stable() {
        let plain = run(TransformSpec::new("hash"), Cell::from("alice")).unwrap();
        let again = run(TransformSpec::new("hash"), Cell::from("alice")).unwrap();
        let salted = run(
            TransformSpec::with_params("hash", json!({"salt": "s3cret"})),
            Cell::from("alice"),
        )
        .unwrap();
        assert_eq!(plain, again);
        assert_ne!(plain, salted);
        assert_eq!(plain.text().len(), 64);
        assert_eq!(run(TransformSpec::new("hash"), Cell::Null).unwrap(), Cell::Null);
    }

    #[test]
    fn test_date_formats() {
        let spec = TransformSpec::with_params("date", json!({"format": "%d/%m/%Y"}));
        assert_eq!(
            run(spec.clone(), Cell::from("2024-03-05T10:00:00Z")).unwrap(),
            Cell::from("05/03/2024")
        );
        assert_eq!(run(spec.clone(), Cell::from("2024-03-05")).unwrap(), Cell::from("05/03/2024"));
        assert!(run(spec, Cell::from("yesterday")).is_err());
    }

    #[test]
    fn test_date_with_unrenderable_format_fails() {
        let spec = TransformSpec::with_params("date", json!({"format": "%Q"}));
        let err = run(spec.clone(), Cell::from("2024-03-05")).unwrap_err();
        assert!(err.to_string().contains("%Q"));

        // a time zone cannot be rendered from a bare date
        let spec = TransformSpec::with_params("date", json!({"format": "%z"}));
        assert!(run(spec, Cell::from("2024-03-05")).is_err());
    }

    #[test]
    fn test_lookup_and_default() {
        let spec = TransformSpec::with_params("lookup", json!({"values": {"m": "male"}}));
        assert_eq!(run(spec.clone(), Cell::from("m")).unwrap(), Cell::from("male"));
        assert!(run(spec, Cell::from("x")).is_err());

        let spec = TransformSpec::with_params("lookup", json!({"values": {}, "default": "n/a"}));
        assert_eq!(run(spec, Cell::from("x")).unwrap(), Cell::from("n/a"));
    }

    #[test]
    fn test_truncate_and_unknown() {
        let spec = TransformSpec::with_params("truncate", json!({"length": 3}));
        assert_eq!(run(spec, Cell::from("abcdef")).unwrap(), Cell::from("abc"));
        assert!(run(TransformSpec::new("truncate"), Cell::from("abc")).is_err());
        assert!(run(TransformSpec::new("rot13"), Cell::from("abc")).is_err());
    }

    #[test]
    fn test_spec_serde() {
        let spec: TransformSpec = serde_json::from_value(json!({"name": "identity"})).unwrap();
        assert_eq!(spec, TransformSpec::new("identity"));
        assert_eq!(serde_json::to_value(&spec).unwrap(), json!({"name": "identity"}));
    }
}
