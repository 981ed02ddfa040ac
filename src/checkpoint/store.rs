//! Checkpoint ledger backed by a JSON file
//!
//! Records are kept in memory and, when a path is configured, the whole
//! ledger is rewritten on every save: staged in a uniquely named temp file
//! next to the ledger, then persisted over the original.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ConfigError, Result};

use super::{Checkpoint, CheckpointStore, Cursor, ExportIndex};

/// Append-only checkpoint history
pub struct CheckpointLedger {
    path: Option<PathBuf>,
    records: RwLock<Vec<Checkpoint>>,
}

impl CheckpointLedger {
    /// Ledger that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Open a ledger file, starting empty when it does not exist yet
    ///
    /// # Arguments
    /// * `path` - JSON file holding an array of checkpoints
    ///
    /// # Returns
    /// * `Result<Self>` - Ledger loaded from the file
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    ConfigError::InvalidFormat(format!("{}: {e}", path.display()))
                })?
            }
        } else {
            Vec::new()
        };

        debug!("Opened checkpoint ledger {} ({} records)", path.display(), records.len());
        Ok(Self {
            path: Some(path),
            records: RwLock::new(records),
        })
    }

    async fn persist(&self, records: &[Checkpoint]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let encoded = serde_json::to_vec_pretty(records)?;
        let path = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &encoded))
            .await
            .map_err(std::io::Error::other)??;
        Ok(())
    }

    async fn find<F>(&self, predicate: F) -> Vec<Checkpoint>
    where
        F: Fn(&Checkpoint) -> bool,
    {
        let records = self.records.read().await;
        records.iter().filter(|c| predicate(c)).cloned().collect()
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staging = tempfile::NamedTempFile::new_in(dir)?;
    staging.write_all(contents)?;
    staging.as_file().sync_all()?;
    staging.persist(path)?;
    Ok(())
}

#[async_trait]
impl CheckpointStore for CheckpointLedger {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut records = self.records.write().await;
        records.push(checkpoint.clone());
        if let Err(e) = self.persist(&records).await {
            records.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn latest_by_timestamp(&self, index: &ExportIndex) -> Result<Option<Checkpoint>> {
        let candidates = self
            .find(|c| &c.index == index && c.cursor.timestamp().is_some())
            .await;
        Ok(candidates
            .into_iter()
            .max_by_key(|c| (c.cursor.timestamp(), c.created_at)))
    }

    async fn latest_by_sequence(&self, index: &ExportIndex) -> Result<Option<Checkpoint>> {
        let candidates = self
            .find(|c| &c.index == index && matches!(c.cursor, Cursor::Sequence(_)))
            .await;
        Ok(candidates
            .into_iter()
            .max_by(|a, b| a.cursor.sequence().cmp(&b.cursor.sequence())))
    }

    async fn history(&self, index: &ExportIndex) -> Result<Vec<Checkpoint>> {
        let mut history = self.find(|c| &c.index == index).await;
        history.sort_by_key(|c| c.created_at);
        Ok(history)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Checkpoint>> {
        Ok(self.find(|c| c.id == id).await.into_iter().next())
    }

    async fn all_indices(&self) -> Result<Vec<ExportIndex>> {
        let records = self.records.read().await;
        let indices: BTreeSet<ExportIndex> = records.iter().map(|c| c.index.clone()).collect();
        Ok(indices.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::SequenceToken;
    use crate::schema::{infer, Schema};
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn test_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.json");
        let index = ExportIndex::new(["acme", "visit"]);
        let schema = infer(&json!({"name": "x", "items": [{"q": 1}]})).unwrap();

        let ledger = CheckpointLedger::open(&path).await.unwrap();
        let saved = Checkpoint::new(index.clone(), Cursor::Timestamp(Utc::now()), schema.clone());
        ledger.save(&saved).await.unwrap();

        let reopened = CheckpointLedger::open(&path).await.unwrap();
        let loaded = reopened.get(saved.id).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.schema, schema);
    }

    #[tokio::test]
    async fn test_ledgers_sharing_a_file_leave_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.json");
        let index = ExportIndex::new(["acme", "visit"]);
        let first = CheckpointLedger::open(&path).await.unwrap();
        let second = CheckpointLedger::open(&path).await.unwrap();

        let saves = (0..4).map(|i| {
            let ledger = if i % 2 == 0 { &first } else { &second };
            let checkpoint = Checkpoint::new(index.clone(), Cursor::Timestamp(Utc::now()), Schema::Null);
            async move { ledger.save(&checkpoint).await }
        });
        for result in futures::future::join_all(saves).await {
            result.unwrap();
        }

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["checkpoints.json"]);
        let reopened = CheckpointLedger::open(&path).await.unwrap();
        assert_eq!(reopened.history(&index).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_indices_and_history() {
        let ledger = CheckpointLedger::in_memory();
        let forms = ExportIndex::new(["forms"]);
        let cases = ExportIndex::new(["cases"]);

        for (index, token) in [(&forms, "1"), (&cases, "2"), (&forms, "3")] {
            let cursor = Cursor::Sequence(SequenceToken::new(token));
            ledger
                .save(&Checkpoint::new(index.clone(), cursor, Schema::Null))
                .await
                .unwrap();
        }

        assert_eq!(ledger.all_indices().await.unwrap(), vec![cases.clone(), forms.clone()]);
        let history = ledger.history(&forms).await.unwrap();
        let tokens: Vec<String> = history.iter().map(|c| c.cursor.to_string()).collect();
        assert_eq!(tokens, ["seq:1", "seq:3"]);
        assert!(ledger.latest_by_timestamp(&forms).await.unwrap().is_none());
    }
}
