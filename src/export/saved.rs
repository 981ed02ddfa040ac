//! Saved export configurations
//!
//! A [`SavedExport`] names an export index and says which tables and columns
//! to emit, under which titles, with which transforms. An export without
//! table configuration is the default (full) export: every table of the
//! schema is emitted with all of its columns.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checkpoint::ExportIndex;
use crate::error::{ConfigError, ExportError, Result, SchemaError};
use crate::projection::row::id_headers;
use crate::projection::{
    narrow, project_document, DocumentFilter, NarrowContext, ProjectedTable, TableConfig,
    TransformRegistry, TransformSpec,
};
use crate::schema::flatten::tag_depth;
use crate::schema::{flatten, Schema, TableLayout, ID_COLUMN, REPEAT_MARKER};

use super::format::Format;
use super::writers::TableHeader;

/// Title of the root table when nothing better is known
const FALLBACK_TABLE_NAME: &str = "Form";

fn default_format() -> Format {
    Format::Xlsx
}

fn default_apply_transforms() -> bool {
    true
}

/// User-authored export of one index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedExport {
    pub name: String,
    pub index: ExportIndex,

    /// Output tables; empty for the default export
    #[serde(default)]
    pub tables: Vec<TableConfig>,

    #[serde(default = "default_format")]
    pub default_format: Format,

    /// Which documents are exported
    #[serde(default, skip_serializing_if = "DocumentFilter::is_empty")]
    pub filter: DocumentFilter,

    /// Applied to columns without a transform of their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_transform: Option<TransformSpec>,

    #[serde(default = "default_apply_transforms")]
    pub apply_transforms: bool,
}

impl SavedExport {
    /// Default (full) export of an index
    pub fn default_for(index: ExportIndex) -> Self {
        let name = index
            .components()
            .last()
            .cloned()
            .unwrap_or_else(|| FALLBACK_TABLE_NAME.to_string());
        Self {
            name,
            index,
            tables: Vec::new(),
            default_format: default_format(),
            filter: DocumentFilter::default(),
            global_transform: None,
            apply_transforms: true,
        }
    }

    /// Load a saved export from a JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ExportError::from(ConfigError::FileNotFound(format!("{} ({e})", path.display())))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ConfigError::InvalidFormat(format!("{}: {e}", path.display())).into()
        })
    }

    pub fn is_default(&self) -> bool {
        self.tables.is_empty()
    }

    /// Display name of the export's main table
    pub fn table_name(&self) -> String {
        if let Some(table) = self.tables.first() {
            if !table.display.is_empty() {
                return table.display.clone();
            }
        }
        self.index
            .components()
            .get(2)
            .cloned()
            .unwrap_or_else(|| FALLBACK_TABLE_NAME.to_string())
    }

    /// Header rows to open a writer with
    pub fn table_headers(&self, schema: &Schema, separator: &str) -> Vec<TableHeader> {
        if self.is_default() {
            flatten(schema, separator)
                .into_iter()
                .map(|layout| {
                    let mut headers = id_headers(ID_COLUMN, tag_depth(&layout.tag, separator));
                    headers.extend(layout.columns().iter().cloned());
                    TableHeader::new(layout.tag, headers)
                })
                .collect()
        } else {
            self.tables
                .iter()
                .map(|table| TableHeader::new(table.index.clone(), table.headers_row(separator)))
                .collect()
        }
    }

    /// Title overrides by table tag
    pub fn table_titles(&self) -> HashMap<String, String> {
        if self.is_default() {
            return HashMap::from([(REPEAT_MARKER.to_string(), self.table_name())]);
        }
        self.tables
            .iter()
            .filter(|table| !table.display.is_empty())
            .map(|table| (table.index.clone(), table.display.clone()))
            .collect()
    }

    /// Check that every configured table and column maps onto `schema`
    ///
    /// A tag that flattening produces more than once is ambiguous and counts
    /// as a mismatch too.
    pub fn check_layout(&self, schema: &Schema, separator: &str) -> std::result::Result<(), SchemaError> {
        let layouts = flatten(schema, separator);
        for table in &self.tables {
            let matching: Vec<&TableLayout> = layouts.iter().filter(|l| l.tag == table.index).collect();
            match matching.as_slice() {
                [layout] => table.check_columns(layout.columns())?,
                [] => {
                    return Err(SchemaError::Mismatch(format!(
                        "table '{}' is not in the schema",
                        table.index
                    )))
                }
                _ => {
                    return Err(SchemaError::Mismatch(format!(
                        "table '{}' is ambiguous in the schema",
                        table.index
                    )))
                }
            }
        }
        Ok(())
    }

    /// Turn one document into the tables this export writes
    pub fn project(
        &self,
        doc: &Value,
        schema: &Schema,
        separator: &str,
        registry: &TransformRegistry,
    ) -> std::result::Result<Vec<ProjectedTable>, SchemaError> {
        let tables = project_document(doc, schema, separator);
        if self.is_default() {
            return Ok(tables.into_iter().map(ProjectedTable::from).collect());
        }

        let ctx = NarrowContext {
            registry,
            global_transform: self.global_transform.as_ref(),
            apply_transforms: self.apply_transforms,
        };
        narrow(&tables, &self.tables, doc, &ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{Cell, ColumnConfig};
    use crate::schema::infer;
    use serde_json::json;

    fn visit_index() -> ExportIndex {
        ExportIndex::new(["acme", "forms", "Visit"])
    }

    #[test]
    fn test_table_name_fallbacks() {
        let mut export = SavedExport::default_for(visit_index());
        assert_eq!(export.table_name(), "Visit");
        assert_eq!(SavedExport::default_for(ExportIndex::new(["acme"])).table_name(), "Form");

        export.tables.push(TableConfig::new("#", "Visits", vec![]));
        assert_eq!(export.table_name(), "Visits");
    }

    #[test]
    fn test_default_export_headers_and_titles() {
        let doc = json!({"name": "x", "items": [{"q": 1}]});
        let export = SavedExport::default_for(visit_index());
        let headers = export.table_headers(&infer(&doc).unwrap(), ".");

        assert_eq!(headers[0], TableHeader::new("#", vec!["id".into(), "name".into()]));
        assert_eq!(
            headers[1],
            TableHeader::new(
                "#.items.#",
                vec!["id".into(), "id__0".into(), "id__1".into(), "items.#.q".into()]
            )
        );
        assert_eq!(export.table_titles().get("#").map(String::as_str), Some("Visit"));
    }

    #[test]
    fn test_check_layout() {
        let schema = infer(&json!({"name": "x", "items": [{"q": 1}]})).unwrap();
        let mut export = SavedExport::default_for(visit_index());
        export.tables = vec![
            TableConfig::new("#", "Visits", vec![ColumnConfig::new("name", "Name")]),
            TableConfig::new("#.items.#", "Items", vec![ColumnConfig::new("id", "ID")]),
        ];
        assert!(export.check_layout(&schema, ".").is_ok());

        export.tables[0].columns.push(ColumnConfig::new("missing", "Missing"));
        assert!(matches!(export.check_layout(&schema, "."), Err(SchemaError::Mismatch(_))));

        export.tables = vec![TableConfig::new("#.other.#", "Other", vec![])];
        assert!(export.check_layout(&schema, ".").is_err());
    }

    #[test]
    fn test_project_default_and_configured() {
        let doc = json!({"name": "danny", "age": 3});
        let schema = infer(&doc).unwrap();
        let registry = TransformRegistry::default();

        let export = SavedExport::default_for(visit_index());
        let tables = export.project(&doc, &schema, ".", &registry).unwrap();
        assert_eq!(tables[0].rows[0].data().len(), 3);

        let mut configured = export.clone();
        configured.tables = vec![TableConfig::new("#", "P", vec![ColumnConfig::new("name", "Name")])];
        let tables = configured.project(&doc, &schema, ".", &registry).unwrap();
        assert_eq!(tables[0].rows[0].data(), vec![Cell::from("danny")]);
    }

    #[test]
    fn test_deserialize_defaults() {
        let export: SavedExport = serde_json::from_value(json!({
            "name": "visits",
            "index": ["acme", "forms", "Visit"],
            "tables": [{"index": "#", "display": "Visits", "columns": [
                {"index": "name", "display": "Name"},
                {"index": "_attachments.a.jpg", "display": "A"}
            ]}],
            "filter": [{"path": "type", "equals": "visit"}]
        }))
        .unwrap();
        assert_eq!(export.default_format, Format::Xlsx);
        assert!(export.apply_transforms);
        assert_eq!(export.tables[0].columns.len(), 1);
        assert!(export.filter.matches(&json!({"type": "visit"})));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        tokio::fs::write(&path, r#"{"name": "n", "index": "forms"}"#).await.unwrap();

        let export = SavedExport::load(&path).await.unwrap();
        assert!(export.is_default());
        assert_eq!(export.index, ExportIndex::new(["forms"]));
        assert!(SavedExport::load(dir.path().join("missing.json")).await.is_err());
    }
}
