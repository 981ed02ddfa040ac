//! Group exports
//!
//! A group bundles several exports that run together and land as files in
//! one output directory, `<name>.<extension>` each. A saved layout that no
//! longer matches its schema skips only that export and queues a schema
//! rebuild; any other failure aborts the group.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::checkpoint::ExportIndex;
use crate::error::{ConfigError, ExportError, Result};

use super::coordinator::ExportCoordinator;
use super::format::Format;
use super::saved::SavedExport;

/// Default (full) export of one index within a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfiguration {
    pub index: ExportIndex,
    pub name: String,
    /// Falls back to the saved export's default format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
}

/// Exports that run together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupExportConfig {
    #[serde(default)]
    pub exports: Vec<ExportConfiguration>,
    #[serde(default)]
    pub custom: Vec<SavedExport>,
    /// Cap for header names
    #[serde(default = "default_max_column_size")]
    pub max_column_size: usize,
}

fn default_max_column_size() -> usize {
    crate::projection::names::DEFAULT_MAX_COLUMN_SIZE
}

impl GroupExportConfig {
    /// Load a group from a TOML file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ExportError::from(ConfigError::FileNotFound(format!("{} ({e})", path.display())))
        })?;
        toml::from_str(&content).map_err(|e| {
            ConfigError::InvalidFormat(format!("{}: {e}", path.display())).into()
        })
    }

    /// Every export of the group with the format it is written in
    pub fn targets(&self) -> Vec<(SavedExport, Format)> {
        let defaults = self.exports.iter().map(|export| {
            let mut saved = SavedExport::default_for(export.index.clone());
            saved.name = export.name.clone();
            let format = export.format.unwrap_or(saved.default_format);
            (saved, format)
        });
        let custom = self
            .custom
            .iter()
            .map(|saved| (saved.clone(), saved.default_format));
        defaults.chain(custom).collect()
    }
}

/// Receiver of schema rebuild requests
#[async_trait]
pub trait RebuildScheduler: Send + Sync {
    async fn schedule_rebuild(&self, index: &ExportIndex);
}

/// Rebuild requests collected for later processing, without duplicates
#[derive(Default)]
pub struct RebuildQueue {
    pending: Mutex<Vec<ExportIndex>>,
}

impl RebuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued index
    pub async fn drain(&self) -> Vec<ExportIndex> {
        std::mem::take(&mut *self.pending.lock().await)
    }
}

#[async_trait]
impl RebuildScheduler for RebuildQueue {
    async fn schedule_rebuild(&self, index: &ExportIndex) {
        let mut pending = self.pending.lock().await;
        if !pending.contains(index) {
            pending.push(index.clone());
        }
    }
}

/// Outcome of a group run
#[derive(Debug, Default)]
pub struct GroupExportReport {
    /// Files written
    pub written: Vec<PathBuf>,
    /// Exports with nothing to export yet
    pub empty: Vec<String>,
    /// Exports skipped because their layout no longer matches
    pub skipped: Vec<String>,
}

/// Run every export of a group into `output_dir`
pub async fn export_group(
    coordinator: &ExportCoordinator,
    config: &GroupExportConfig,
    output_dir: &Path,
    scheduler: &dyn RebuildScheduler,
) -> Result<GroupExportReport> {
    tokio::fs::create_dir_all(output_dir).await?;
    let mut report = GroupExportReport::default();

    for (saved, format) in config.targets() {
        match coordinator
            .export(&saved, format, None, config.max_column_size)
            .await
        {
            Ok(Some(output)) => {
                let path = output_dir.join(format!("{}.{}", saved.name, format.extension()));
                tokio::fs::write(&path, &output.bytes).await?;
                info!("Wrote {} ({} documents)", path.display(), output.documents);
                report.written.push(path);
            }
            Ok(None) => {
                info!("Nothing to export for {}", saved.name);
                report.empty.push(saved.name);
            }
            Err(e) if e.is_schema_mismatch() => {
                error!("Skipping export {}: {}; schema rebuild scheduled", saved.name, e);
                scheduler.schedule_rebuild(&saved.index).await;
                report.skipped.push(saved.name);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointLedger;
    use crate::projection::{ColumnConfig, TableConfig};
    use crate::source::{MemoryDocumentStore, StoredDocument};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_parse_group_toml() {
        let config: GroupExportConfig = toml::from_str(
            r##"
            [[exports]]
            index = ["acme", "forms", "Visit"]
            name = "visits"
            format = "csv"

            [[exports]]
            index = "cases"
            name = "cases"

            [[custom]]
            name = "people"
            index = ["acme", "forms", "People"]
            default_format = "json"

            [[custom.tables]]
            index = "#"
            display = "People"
            columns = [{ index = "name", display = "Name" }]
            "##,
        )
        .unwrap();

        let targets = config.targets();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].1, Format::Csv);
        assert_eq!(targets[1].0.index, ExportIndex::new(["cases"]));
        assert_eq!(targets[1].1, Format::Xlsx);
        assert_eq!(targets[2].1, Format::Json);
        assert_eq!(targets[2].0.tables[0].columns.len(), 1);
        assert_eq!(config.max_column_size, 2000);
    }

    #[tokio::test]
    async fn test_mismatch_skips_and_schedules_rebuild() {
        let store = Arc::new(MemoryDocumentStore::new());
        let index = ExportIndex::new(["acme", "forms", "People"]);
        store
            .put(StoredDocument {
                id: "a".to_string(),
                index: index.clone(),
                modified_on: Utc::now(),
                doc: json!({"name": "danny"}),
            })
            .unwrap();
        let coordinator = ExportCoordinator::new(store, Arc::new(CheckpointLedger::in_memory()));

        let mut broken = SavedExport::default_for(index.clone());
        broken.name = "broken".to_string();
        broken.default_format = Format::Json;
        broken.tables = vec![TableConfig::new("#", "P", vec![ColumnConfig::new("age", "Age")])];
        let config = GroupExportConfig {
            exports: vec![
                ExportConfiguration {
                    index: index.clone(),
                    name: "people".to_string(),
                    format: Some(Format::UnzippedCsv),
                },
                ExportConfiguration {
                    index: ExportIndex::new(["empty"]),
                    name: "nothing".to_string(),
                    format: None,
                },
            ],
            custom: vec![broken],
            max_column_size: 2000,
        };

        let dir = tempfile::tempdir().unwrap();
        let queue = RebuildQueue::new();
        let report = export_group(&coordinator, &config, dir.path(), &queue).await.unwrap();

        assert_eq!(report.written, [dir.path().join("people.csv")]);
        assert_eq!(report.empty, ["nothing"]);
        assert_eq!(report.skipped, ["broken"]);
        assert_eq!(queue.drain().await, [index]);
        assert!(queue.drain().await.is_empty());

        let csv = tokio::fs::read(dir.path().join("people.csv")).await.unwrap();
        assert!(csv.ends_with(b"id,name\r\n0,danny\r\n"));
    }
}
