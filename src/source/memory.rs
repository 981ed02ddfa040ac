//! In-process document store
//!
//! Keeps documents in memory together with a change feed: every write gets
//! the next sequence number. Stores can be loaded from a JSON-lines file where
//! each line is a [`StoredDocument`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::checkpoint::{ExportIndex, SequenceToken};
use crate::error::{ConfigError, ExportError, Result};

use super::{DocId, Document, DocumentSource};

/// One line of a store file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Document id
    pub id: DocId,
    /// Export index the document belongs to
    pub index: ExportIndex,
    /// Last modification time (defaults to load time)
    #[serde(default = "Utc::now")]
    pub modified_on: DateTime<Utc>,
    /// Document body
    pub doc: Document,
}

#[derive(Default)]
struct StoreState {
    documents: BTreeMap<DocId, StoredDocument>,
    /// (sequence, id) per write, ascending
    feed: Vec<(u64, DocId)>,
    sequence: u64,
}

/// Document store held in memory
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: RwLock<StoreState>,
}

impl MemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON-lines file
    ///
    /// # Arguments
    /// * `path` - File with one [`StoredDocument`] per line; blank lines are skipped
    ///
    /// # Returns
    /// * `Result<Self>` - Store with every line written in file order
    pub async fn load_jsonl<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ExportError::from(ConfigError::FileNotFound(format!("{} ({e})", path.display())))
        })?;

        let store = Self::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: StoredDocument = serde_json::from_str(line).map_err(|e| {
                ConfigError::InvalidFormat(format!("{}:{}: {e}", path.display(), line_no + 1))
            })?;
            store.put(record)?;
        }

        debug!("Loaded {} documents from {}", store.len(), path.display());
        Ok(store)
    }

    /// Insert or replace a document, appending it to the change feed
    ///
    /// # Returns
    /// * `Result<u64>` - Sequence number assigned to the write
    pub fn put(&self, record: StoredDocument) -> Result<u64> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.sequence += 1;
        let sequence = state.sequence;
        state.feed.push((sequence, record.id.clone()));
        state.documents.insert(record.id.clone(), record);
        Ok(sequence)
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.documents.len()).unwrap_or(0)
    }

    /// Whether the store holds no documents
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, id: &str) -> Result<Option<Document>> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.documents.get(id).map(|record| record.doc.clone()))
    }

    fn select<F>(&self, predicate: F) -> Result<BTreeSet<DocId>>
    where
        F: Fn(&StoredDocument) -> bool,
    {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .documents
            .values()
            .filter(|record| predicate(record))
            .map(|record| record.id.clone())
            .collect())
    }
}

fn poisoned() -> ExportError {
    ExportError::Source("document store lock poisoned".to_string())
}

#[async_trait]
impl DocumentSource for MemoryDocumentStore {
    async fn all_ids(&self, index: &ExportIndex) -> Result<BTreeSet<DocId>> {
        self.select(|record| &record.index == index)
    }

    async fn ids_modified_since(
        &self,
        index: &ExportIndex,
        since: DateTime<Utc>,
    ) -> Result<BTreeSet<DocId>> {
        self.select(|record| &record.index == index && record.modified_on >= since)
    }

    async fn changed_ids_since(&self, token: &SequenceToken) -> Result<Option<BTreeSet<DocId>>> {
        let Some(since) = token.as_number() else {
            warn!("Change feed cannot resume from non-numeric token {}", token);
            return Ok(None);
        };

        let state = self.state.read().map_err(|_| poisoned())?;
        let changed: BTreeSet<DocId> = state
            .feed
            .iter()
            .filter(|(sequence, _)| *sequence > since)
            .map(|(_, id)| id.clone())
            .collect();

        Ok(if changed.is_empty() { None } else { Some(changed) })
    }

    async fn current_max_sequence(&self) -> Result<SequenceToken> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(SequenceToken::new(state.sequence.to_string()))
    }

    fn fetch_documents(&self, ids: Vec<DocId>) -> BoxStream<'_, Result<Document>> {
        stream::iter(ids)
            .filter_map(move |id| async move { self.lookup(&id).transpose() })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use futures::TryStreamExt;
    use serde_json::json;

    fn record(id: &str, index: &ExportIndex, day: u32) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            index: index.clone(),
            modified_on: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            doc: json!({"_id": id}),
        }
    }

    #[tokio::test]
    async fn test_queries_by_index_and_time() {
        let forms = ExportIndex::new(["acme", "forms"]);
        let cases = ExportIndex::new(["acme", "cases"]);
        let store = MemoryDocumentStore::new();
        store.put(record("a", &forms, 1)).unwrap();
        store.put(record("b", &forms, 5)).unwrap();
        store.put(record("c", &cases, 5)).unwrap();

        let all = store.all_ids(&forms).await.unwrap();
        assert_eq!(all.into_iter().collect::<Vec<_>>(), ["a", "b"]);

        let since = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        let recent = store.ids_modified_since(&forms, since).await.unwrap();
        assert_eq!(recent.into_iter().collect::<Vec<_>>(), ["b"]);
    }

    #[tokio::test]
    async fn test_change_feed() {
        let index = ExportIndex::new(["forms"]);
        let store = MemoryDocumentStore::new();
        store.put(record("a", &index, 1)).unwrap();
        store.put(record("b", &index, 1)).unwrap();

        assert_eq!(store.current_max_sequence().await.unwrap(), SequenceToken::new("2"));
        let changed = store.changed_ids_since(&SequenceToken::new("1")).await.unwrap();
        assert_eq!(changed.unwrap().into_iter().collect::<Vec<_>>(), ["b"]);
        assert!(store.changed_ids_since(&SequenceToken::new("2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_skips_missing_ids() {
        let index = ExportIndex::new(["forms"]);
        let store = MemoryDocumentStore::new();
        store.put(record("a", &index, 1)).unwrap();

        let docs: Vec<Document> = store
            .fetch_documents(vec!["a".to_string(), "gone".to_string()])
            .try_collect()
            .await
            .unwrap();
        assert_eq!(docs, vec![json!({"_id": "a"})]);
    }

    #[test]
    fn test_rewrite_moves_document_in_feed() {
        let index = ExportIndex::new(["forms"]);
        let store = MemoryDocumentStore::new();
        store.put(record("a", &index, 1)).unwrap();
        store.put(record("b", &index, 1)).unwrap();
        store.put(record("a", &index, 2)).unwrap();

        assert_eq!(store.len(), 2);
        let changed = tokio_test::block_on(store.changed_ids_since(&SequenceToken::new("2")))
            .unwrap()
            .unwrap();
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), ["a"]);
    }

    #[tokio::test]
    async fn test_load_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.jsonl");
        tokio::fs::write(
            &path,
            concat!(
                r#"{"id": "1", "index": ["forms"], "doc": {"name": "a"}}"#,
                "\n\n",
                r#"{"id": "2", "index": "forms", "modified_on": "2024-01-01T00:00:00Z", "doc": {}}"#,
                "\n"
            ),
        )
        .await
        .unwrap();

        let store = MemoryDocumentStore::load_jsonl(&path).await.unwrap();
        assert_eq!(store.len(), 2);
        let ids = store.all_ids(&ExportIndex::new(["forms"])).await.unwrap();
        assert_eq!(ids.len(), 2);
    }
}
