//! Checkpoints and incremental progress tracking
//!
//! A [`Checkpoint`] pairs the schema computed for an export index with a
//! [`Cursor`] saying how far the index has been processed. Each index moves
//! from "no checkpoint" to "has checkpoint" only through
//! [`create_checkpoint`]; earlier checkpoints are kept for audit and
//! rollback.
//!
//! # Selecting new documents
//!
//! - no checkpoint, or a zero sequence token: every id of the index
//! - timestamp cursor: ids modified at or after the timestamp
//! - sequence cursor: change-feed ids since the token, intersected with the
//!   ids of the index
//!
//! A sequence token beyond the store's current maximum means the store was
//! reset or migrated. Such a checkpoint is discarded and the run becomes a
//! full rebuild.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::schema::Schema;
use crate::source::{DocId, DocumentSource};

pub mod cursor;
pub mod index;
pub mod store;

pub use cursor::{Cursor, SequenceToken};
pub use index::ExportIndex;
pub use store::CheckpointLedger;

/// Persisted (cursor, schema) pair for one export index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub index: ExportIndex,
    pub schema: Schema,
    pub cursor: Cursor,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Build a new, unsaved checkpoint
    pub fn new(index: ExportIndex, cursor: Cursor, schema: Schema) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            schema,
            cursor,
            created_at: Utc::now(),
        }
    }
}

/// Persistence for checkpoints
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a new checkpoint; existing records are never modified
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Newest checkpoint of `index` carrying a timestamp cursor
    async fn latest_by_timestamp(&self, index: &ExportIndex) -> Result<Option<Checkpoint>>;

    /// Newest checkpoint of `index` carrying a sequence cursor, by token order
    async fn latest_by_sequence(&self, index: &ExportIndex) -> Result<Option<Checkpoint>>;

    /// Every checkpoint of `index`, oldest first
    async fn history(&self, index: &ExportIndex) -> Result<Vec<Checkpoint>>;

    /// Look up one checkpoint by id
    async fn get(&self, id: Uuid) -> Result<Option<Checkpoint>>;

    /// Distinct indices that have at least one checkpoint
    async fn all_indices(&self) -> Result<Vec<ExportIndex>>;
}

/// Most recent checkpoint for an index
///
/// Timestamp checkpoints win; legacy sequence checkpoints are only used when
/// the index has no timestamp checkpoint at all.
pub async fn latest(store: &dyn CheckpointStore, index: &ExportIndex) -> Result<Option<Checkpoint>> {
    if let Some(checkpoint) = store.latest_by_timestamp(index).await? {
        return Ok(Some(checkpoint));
    }

    let legacy = store.latest_by_sequence(index).await?;
    if let Some(checkpoint) = &legacy {
        warn!(
            "Checkpoint {} for {} has no timestamp, falling back to sequence {}",
            checkpoint.id, index, checkpoint.cursor
        );
    }
    Ok(legacy)
}

/// Discard a checkpoint whose sequence token lies beyond the store's maximum
///
/// # Arguments
/// * `checkpoint` - Checkpoint to check
/// * `store_max` - The document store's current maximum sequence token
///
/// # Returns
/// * `Option<&Checkpoint>` - The checkpoint unchanged, or `None` when stale
pub fn validate<'a>(checkpoint: &'a Checkpoint, store_max: &SequenceToken) -> Option<&'a Checkpoint> {
    match &checkpoint.cursor {
        Cursor::Sequence(token) if token.exceeds(store_max) => {
            info!(
                "Discarding checkpoint {} for {}: sequence {} is beyond store maximum {}",
                checkpoint.id, checkpoint.index, token, store_max
            );
            None
        }
        _ => Some(checkpoint),
    }
}

/// Ids of `index` that changed since `checkpoint`
///
/// Sequence checkpoints are validated against the store first, so a stale
/// token falls back to every id of the index.
pub async fn new_ids(
    source: &dyn DocumentSource,
    checkpoint: Option<&Checkpoint>,
    index: &ExportIndex,
) -> Result<BTreeSet<DocId>> {
    let checkpoint = match checkpoint {
        Some(checkpoint) if checkpoint.cursor.sequence().is_some() => {
            let store_max = source.current_max_sequence().await?;
            validate(checkpoint, &store_max)
        }
        other => other,
    };

    match checkpoint.map(|c| &c.cursor) {
        None => source.all_ids(index).await,
        Some(Cursor::Sequence(token)) if token.is_zero() => source.all_ids(index).await,
        Some(Cursor::Timestamp(since)) => source.ids_modified_since(index, *since).await,
        Some(Cursor::Sequence(token)) => match source.changed_ids_since(token).await? {
            Some(changed) => {
                let members = source.all_ids(index).await?;
                Ok(changed.intersection(&members).cloned().collect())
            }
            None => {
                debug!("Change feed since {} came back empty for {}", token, index);
                Ok(BTreeSet::new())
            }
        },
    }
}

/// Persist a new checkpoint for `index`
pub async fn create_checkpoint(
    store: &dyn CheckpointStore,
    index: &ExportIndex,
    cursor: Cursor,
    schema: Schema,
) -> Result<Checkpoint> {
    let checkpoint = Checkpoint::new(index.clone(), cursor, schema);
    store.save(&checkpoint).await?;
    debug!("Created checkpoint {} for {} at {}", checkpoint.id, index, checkpoint.cursor);
    Ok(checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryDocumentStore, StoredDocument};
    use chrono::TimeZone;
    use serde_json::json;

    fn store_with(index: &ExportIndex, other: &ExportIndex) -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        for (id, idx, day) in [("a", index, 1), ("b", index, 3), ("x", other, 3), ("c", index, 5)] {
            store
                .put(StoredDocument {
                    id: id.to_string(),
                    index: idx.clone(),
                    modified_on: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
                    doc: json!({"v": id}),
                })
                .unwrap();
        }
        store
    }

    fn sequence_checkpoint(index: &ExportIndex, token: &str) -> Checkpoint {
        Checkpoint::new(
            index.clone(),
            Cursor::Sequence(SequenceToken::new(token)),
            Schema::Null,
        )
    }

    fn ids(set: BTreeSet<DocId>) -> Vec<String> {
        set.into_iter().collect()
    }

    #[tokio::test]
    async fn test_no_checkpoint_and_zero_token_return_all_ids() {
        let index = ExportIndex::new(["forms"]);
        let source = store_with(&index, &ExportIndex::new(["cases"]));
        let all = source.all_ids(&index).await.unwrap();

        assert_eq!(new_ids(&source, None, &index).await.unwrap(), all);
        let zero = sequence_checkpoint(&index, "0");
        assert_eq!(new_ids(&source, Some(&zero), &index).await.unwrap(), all);
    }

    #[tokio::test]
    async fn test_stale_sequence_forces_full_rebuild() {
        let index = ExportIndex::new(["forms"]);
        let source = store_with(&index, &ExportIndex::new(["cases"]));

        let stale = sequence_checkpoint(&index, "999");
        let max = source.current_max_sequence().await.unwrap();
        assert!(validate(&stale, &max).is_none());
        assert_eq!(ids(new_ids(&source, Some(&stale), &index).await.unwrap()), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_sequence_cursor_intersects_with_index() {
        let index = ExportIndex::new(["forms"]);
        let source = store_with(&index, &ExportIndex::new(["cases"]));

        // writes 3 and 4 are "x" (other index) and "c"
        let checkpoint = sequence_checkpoint(&index, "2");
        assert_eq!(ids(new_ids(&source, Some(&checkpoint), &index).await.unwrap()), ["c"]);

        let caught_up = sequence_checkpoint(&index, "4");
        assert!(new_ids(&source, Some(&caught_up), &index).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timestamp_cursor_is_inclusive() {
        let index = ExportIndex::new(["forms"]);
        let source = store_with(&index, &ExportIndex::new(["cases"]));

        let since = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let checkpoint = Checkpoint::new(index.clone(), Cursor::Timestamp(since), Schema::Null);
        assert_eq!(ids(new_ids(&source, Some(&checkpoint), &index).await.unwrap()), ["b", "c"]);
    }

    #[test]
    fn test_validate_keeps_timestamp_and_clustered_tokens() {
        let index = ExportIndex::new(["forms"]);
        let max = SequenceToken::new("10");

        let timestamp = Checkpoint::new(index.clone(), Cursor::Timestamp(Utc::now()), Schema::Null);
        assert!(validate(&timestamp, &max).is_some());
        assert!(validate(&sequence_checkpoint(&index, "10"), &max).is_some());
        assert!(validate(&sequence_checkpoint(&index, "11-g1AAAA"), &max).is_some());
    }

    #[tokio::test]
    async fn test_latest_prefers_timestamp_then_sequence() {
        let index = ExportIndex::new(["forms"]);
        let ledger = CheckpointLedger::in_memory();

        assert!(latest(&ledger, &index).await.unwrap().is_none());

        create_checkpoint(&ledger, &index, Cursor::Sequence(SequenceToken::new("9")), Schema::Null)
            .await
            .unwrap();
        create_checkpoint(&ledger, &index, Cursor::Sequence(SequenceToken::new("12")), Schema::Null)
            .await
            .unwrap();
        let legacy = latest(&ledger, &index).await.unwrap().unwrap();
        assert_eq!(legacy.cursor, Cursor::Sequence(SequenceToken::new("12")));

        let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        create_checkpoint(&ledger, &index, Cursor::Timestamp(at), Schema::Leaf)
            .await
            .unwrap();
        let current = latest(&ledger, &index).await.unwrap().unwrap();
        assert_eq!(current.cursor, Cursor::Timestamp(at));
        assert_eq!(ledger.history(&index).await.unwrap().len(), 3);
    }
}
