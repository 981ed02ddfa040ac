//! Document source abstraction
//!
//! The document store lives outside this crate. Exports only need a handful
//! of queries from it:
//! - every id belonging to an export index
//! - ids modified at or after a timestamp, per index
//! - ids touched by the change feed since a sequence token
//! - the store's current maximum sequence token
//! - a lazy stream of documents for a set of ids
//!
//! [`MemoryDocumentStore`] implements the trait in-process and backs the CLI.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde_json::Value;

use crate::checkpoint::{ExportIndex, SequenceToken};
use crate::error::Result;

pub mod memory;

pub use memory::{MemoryDocumentStore, StoredDocument};

/// Document identifier assigned by the store
pub type DocId = String;

/// A schema-less document
pub type Document = Value;

/// Queries an export needs from the document store
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// All ids currently belonging to `index`
    async fn all_ids(&self, index: &ExportIndex) -> Result<BTreeSet<DocId>>;

    /// Ids of `index` whose modification time is at or after `since`
    async fn ids_modified_since(
        &self,
        index: &ExportIndex,
        since: DateTime<Utc>,
    ) -> Result<BTreeSet<DocId>>;

    /// Ids changed in the store's change feed after `token`
    ///
    /// # Returns
    /// * `Result<Option<BTreeSet<DocId>>>` - `None` when the feed came back empty
    async fn changed_ids_since(&self, token: &SequenceToken) -> Result<Option<BTreeSet<DocId>>>;

    /// The store's current maximum sequence token
    async fn current_max_sequence(&self) -> Result<SequenceToken>;

    /// Stream the documents for `ids`; order is not guaranteed and ids that
    /// no longer exist are skipped
    fn fetch_documents(&self, ids: Vec<DocId>) -> BoxStream<'_, Result<Document>>;
}
