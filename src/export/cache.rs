//! Export result cache
//!
//! Finished exports are cached under a content key built from the saved
//! export's name and index, the pinned previous checkpoint, the format and
//! the column cap.
//! Keeping at most one concurrent build per key is up to the cache
//! implementation; [`MemoryExportCache`] only expires entries.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::checkpoint::ExportIndex;

use super::coordinator::ExportOutput;
use super::format::Format;

/// Default lifetime of cached exports
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Cache key for an export request (hex BLAKE3 digest)
pub fn cache_key(
    name: &str,
    index: &ExportIndex,
    previous: Option<Uuid>,
    format: Format,
    max_column_size: usize,
) -> String {
    let previous = previous.map(|id| id.to_string()).unwrap_or_default();
    let raw = format!("docexport:{name}:{index}:{previous}:{format}:{max_column_size}");
    blake3::hash(raw.as_bytes()).to_hex().to_string()
}

/// Get/put store for finished exports
#[async_trait]
pub trait ExportCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<ExportOutput>;
    async fn put(&self, key: &str, output: ExportOutput);
}

/// In-process cache with a fixed time to live
pub struct MemoryExportCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, ExportOutput)>>,
}

impl MemoryExportCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryExportCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

#[async_trait]
impl ExportCache for MemoryExportCache {
    async fn get(&self, key: &str) -> Option<ExportOutput> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((stored, output)) if stored.elapsed() < self.ttl => Some(output.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn put(&self, key: &str, output: ExportOutput) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (stored, _)| stored.elapsed() < self.ttl);
        entries.insert(key.to_string(), (Instant::now(), output));
    }
}
