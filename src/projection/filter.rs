//! Document filters
//!
//! A [`DocumentFilter`] is a conjunction of `{path, equals}` predicates over
//! dotted document paths. The empty filter accepts everything.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single equality predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Dotted path into the document; numeric segments index into lists
    pub path: String,
    pub equals: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentFilter {
    predicates: Vec<Predicate>,
}

impl DocumentFilter {
    /// Filter accepting every document
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter requiring `path` to equal `value`
    pub fn equals(path: impl Into<String>, value: Value) -> Self {
        Self {
            predicates: vec![Predicate {
                path: path.into(),
                equals: value,
            }],
        }
    }

    /// Conjunction of two filters
    pub fn and(mut self, other: DocumentFilter) -> Self {
        self.predicates.extend(other.predicates);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.predicates
            .iter()
            .all(|p| resolve(doc, &p.path) == Some(&p.equals))
    }
}

fn resolve<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
