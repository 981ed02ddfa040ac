//! Export index: the key naming one logical export target

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ConfigError, Result};

/// Ordered tag components identifying an export target
///
/// For example `["acme", "http://example.org/forms/visit"]` names the
/// visit forms of one tenant. Serialized as a JSON array; a bare string
/// is accepted as a one-component index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ExportIndex(Vec<String>);

impl ExportIndex {
    /// Create an index from its components
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(components.into_iter().map(Into::into).collect())
    }

    /// Index components in order
    pub fn components(&self) -> &[String] {
        &self.0
    }

    /// Parse an index given on the command line
    ///
    /// Accepts a JSON array (`["acme","visit"]`) or a plain tag (`visit`).
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.starts_with('[') || trimmed.starts_with('"') {
            serde_json::from_str(trimmed).map_err(|e| {
                ConfigError::InvalidValue {
                    field: "index".to_string(),
                    value: format!("{trimmed} ({e})"),
                }
                .into()
            })
        } else if trimmed.is_empty() {
            Err(ConfigError::InvalidValue {
                field: "index".to_string(),
                value: "empty index".to_string(),
            }
            .into())
        } else {
            Ok(Self::new([trimmed]))
        }
    }
}

impl<'de> Deserialize<'de> for ExportIndex {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Tag(String),
            Components(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Tag(tag) => ExportIndex(vec![tag]),
            Raw::Components(components) => ExportIndex(components),
        })
    }
}

impl fmt::Display for ExportIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}
