//! JSON writer
//!
//! Tables are held in memory and encoded on close as
//! `{"<title>": {"headers": [...], "rows": [[...], ...]}}`. Sentinel error
//! cells encode as their message. Titles keep the order tables were opened in.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{Result, WriterError};
use crate::projection::Cell;

use super::FormatWriter;

struct Table {
    tag: String,
    title: String,
    rows: Vec<Vec<Cell>>,
}

/// Writer for the `json` format
#[derive(Default)]
pub struct JsonWriter {
    tables: Vec<Table>,
}

impl JsonWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FormatWriter for JsonWriter {
    async fn init_table(&mut self, tag: &str, title: &str) -> Result<()> {
        self.tables.push(Table {
            tag: tag.to_string(),
            title: title.to_string(),
            rows: Vec::new(),
        });
        Ok(())
    }

    async fn write_row(&mut self, tag: &str, row: &[Cell]) -> Result<()> {
        let table = self
            .tables
            .iter_mut()
            .find(|t| t.tag == tag)
            .ok_or_else(|| WriterError::UnknownTable(tag.to_string()))?;
        table.rows.push(row.to_vec());
        Ok(())
    }

    async fn finish(&mut self) -> Result<Vec<u8>> {
        let mut document = Map::new();
        for table in self.tables.drain(..) {
            let mut rows = table.rows.into_iter();
            let headers = rows.next().unwrap_or_default();
            let mut entry = Map::new();
            entry.insert("headers".to_string(), serde_json::to_value(headers)?);
            entry.insert("rows".to_string(), serde_json::to_value(rows.collect::<Vec<_>>())?);
            document.insert(table.title, Value::Object(entry));
        }
        Ok(serde_json::to_vec(&document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::writers::{ExportWriter, TableHeader};
    use crate::projection::{Constant, FormattedRow, ProjectedTable};
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_people_table() {
        let mut writer = ExportWriter::new(Box::new(JsonWriter::new()));
        let headers = [TableHeader::new("people", vec!["name".into(), "gender".into()])];
        writer.open(&headers, &HashMap::new(), 2000).await.unwrap();
        writer
            .write(vec![ProjectedTable {
                tag: "people".to_string(),
                rows: vec![
                    FormattedRow::header(&["danny", "male"]),
                    FormattedRow::header(&["amelia", "female"]),
                ],
            }])
            .await
            .unwrap();
        let bytes = writer.close().await.unwrap();

        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({"people": {
                "headers": ["name", "gender"],
                "rows": [["danny", "male"], ["amelia", "female"]]
            }})
        );
    }

    #[tokio::test]
    async fn test_titles_follow_open_order() {
        let mut backend = JsonWriter::new();
        for (tag, title) in [("#", "Visits"), ("#.items.#", "Items"), ("#.notes.#", "Attachments")] {
            backend.init_table(tag, title).await.unwrap();
            backend.write_row(tag, &[Cell::from("id")]).await.unwrap();
        }
        let bytes = backend.finish().await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        let titles: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(titles, ["Visits", "Items", "Attachments"]);
    }

    #[tokio::test]
    async fn test_error_cells_unwrap_to_message() {
        let mut backend = JsonWriter::new();
        backend.init_table("#", "Forms").await.unwrap();
        backend.write_row("#", &[Cell::from("a")]).await.unwrap();
        backend
            .write_row("#", &[Cell::Error(Constant::transform_error())])
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&backend.finish().await.unwrap()).unwrap();
        assert_eq!(value, json!({"Forms": {"headers": ["a"], "rows": [["---ERR---"]]}}));
    }
}
