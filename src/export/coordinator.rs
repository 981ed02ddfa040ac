//! Export coordinator for orchestrating export runs
//!
//! Brings together the document source, the checkpoint store, schema
//! inference, projection and a format writer:
//!
//! 1. bring the index's schema up to date from the latest checkpoint
//! 2. select the documents that are new since the pinned previous checkpoint
//! 3. stream them in batches through projection into the writer
//! 4. close the writer, then record a new checkpoint
//!
//! The run timestamp is taken before any id is queried, so documents changed
//! during a run are picked up again by the next one.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::checkpoint::{self, Checkpoint, CheckpointStore, Cursor, ExportIndex};
use crate::error::{ConfigError, Result};
use crate::projection::{DocumentFilter, TransformRegistry};
use crate::schema::{unify, Schema};
use crate::source::DocumentSource;

use super::cache::{cache_key, ExportCache};
use super::format::Format;
use super::progress::ProgressSink;
use super::saved::SavedExport;
use super::streaming::DocumentStream;

/// Default number of documents fetched per batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Settings shared by every run of a coordinator
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Path separator for table tags and column names
    pub separator: String,
    /// Documents fetched per batch
    pub batch_size: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            separator: ".".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Result of an export run
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// Finished artifact
    pub bytes: Vec<u8>,
    pub format: Format,
    /// Checkpoint recorded for this run
    pub checkpoint: Checkpoint,
    /// Number of documents written
    pub documents: u64,
}

/// Coordinator for export runs
pub struct ExportCoordinator {
    source: Arc<dyn DocumentSource>,
    checkpoints: Arc<dyn CheckpointStore>,
    registry: TransformRegistry,
    options: ExportOptions,
    progress: Option<Arc<dyn ProgressSink>>,
    cache: Option<Arc<dyn ExportCache>>,
}

impl ExportCoordinator {
    /// Create a coordinator with the built-in transforms and default options
    pub fn new(source: Arc<dyn DocumentSource>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            source,
            checkpoints,
            registry: TransformRegistry::default(),
            options: ExportOptions::default(),
            progress: None,
            cache: None,
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Report `(completed, total)` after every batch
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Serve repeated filterless exports from `cache`
    pub fn with_cache(mut self, cache: Arc<dyn ExportCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn checkpoints(&self) -> &dyn CheckpointStore {
        self.checkpoints.as_ref()
    }

    /// Fold the documents that are new since `previous` into its schema
    ///
    /// # Arguments
    /// * `index` - Export index to compute the schema for
    /// * `previous` - Checkpoint to continue from, `None` for every document
    /// * `filter` - Only matching documents contribute
    ///
    /// # Returns
    /// * `Result<Option<Schema>>` - `None` when there is neither a previous
    ///   schema nor a qualifying document
    pub async fn compute_latest_schema(
        &self,
        index: &ExportIndex,
        previous: Option<&Checkpoint>,
        filter: &DocumentFilter,
    ) -> Result<Option<Schema>> {
        let ids = checkpoint::new_ids(self.source.as_ref(), previous, index).await?;
        debug!("Computing schema for {} from {} new documents", index, ids.len());

        let mut schema = previous.map(|c| c.schema.clone());
        let mut stream = DocumentStream::new(
            self.source.fetch_documents(ids.into_iter().collect()),
            self.options.batch_size,
        );
        while let Some(batch) = stream.next_batch().await? {
            for doc in batch.iter().filter(|doc| filter.matches(doc)) {
                let current = schema.take().unwrap_or(Schema::Null);
                schema = Some(unify(current, doc)?);
            }
        }
        Ok(schema)
    }

    /// Bring the schema of `index` up to date and record it in a checkpoint
    ///
    /// # Returns
    /// * `Result<Option<Checkpoint>>` - The new checkpoint, or `None` when the
    ///   index has no documents yet
    pub async fn build_latest_schema(&self, index: &ExportIndex) -> Result<Option<Checkpoint>> {
        let run_start = Utc::now();
        let previous = self.latest_valid(index).await?;
        self.record_schema(index, previous.as_ref(), run_start).await
    }

    /// Recompute the schema of `index` from every document
    pub async fn rebuild_schema(&self, index: &ExportIndex) -> Result<Option<Checkpoint>> {
        let run_start = Utc::now();
        info!("Rebuilding schema for {}", index);
        self.record_schema(index, None, run_start).await
    }

    /// Export the documents of a saved export that are new since `previous`
    ///
    /// # Arguments
    /// * `saved` - Export configuration (use [`SavedExport::default_for`] for a full export)
    /// * `format` - Output format
    /// * `previous` - Checkpoint to export changes since, `None` for every document
    /// * `max_column_size` - Cap for header names
    ///
    /// # Returns
    /// * `Result<Option<ExportOutput>>` - `None` when there is nothing to export yet
    pub async fn export(
        &self,
        saved: &SavedExport,
        format: Format,
        previous: Option<Uuid>,
        max_column_size: usize,
    ) -> Result<Option<ExportOutput>> {
        let start_time = Instant::now();
        let run_start = Utc::now();
        let index = &saved.index;
        let separator = self.options.separator.as_str();
        info!("Starting export of {} ({}) as {}", saved.name, index, format);

        let cached = match &self.cache {
            Some(cache) if saved.filter.is_empty() => Some((
                cache,
                cache_key(&saved.name, index, previous, format, max_column_size),
            )),
            _ => None,
        };
        if let Some((cache, key)) = &cached {
            if let Some(hit) = cache.get(key).await {
                info!("Serving export of {} from cache", saved.name);
                return Ok(Some(hit));
            }
        }

        // The schema always covers every document of the index; the filter
        // only selects what is written.
        let latest = self.latest_valid(index).await?;
        let Some(schema) = self
            .compute_latest_schema(index, latest.as_ref(), &DocumentFilter::all())
            .await?
        else {
            info!("Nothing to export for {} yet", index);
            return Ok(None);
        };
        saved.check_layout(&schema, separator)?;

        let pinned = match previous {
            Some(id) => Some(self.pinned_checkpoint(id, index).await?),
            None => None,
        };
        let ids = checkpoint::new_ids(self.source.as_ref(), pinned.as_ref(), index).await?;
        let total = ids.len() as u64;
        info!("Exporting up to {} documents of {}", total, index);

        let mut writer = format.writer();
        writer
            .open(
                &saved.table_headers(&schema, separator),
                &saved.table_titles(),
                max_column_size,
            )
            .await?;

        let mut stream = DocumentStream::new(
            self.source.fetch_documents(ids.into_iter().collect()),
            self.options.batch_size,
        );
        let mut processed = 0u64;
        let mut batch_count = 0u32;
        while let Some(batch) = stream.next_batch().await? {
            for doc in &batch {
                if saved.filter.matches(doc) {
                    let tables = saved.project(doc, &schema, separator, &self.registry)?;
                    writer.write(tables).await?;
                }
            }

            processed += batch.len() as u64;
            batch_count += 1;
            if let Some(progress) = &self.progress {
                progress.set_progress(processed, total);
            }
            if batch_count % 10 == 0 {
                info!(
                    "Progress: {} of {} documents processed ({} batches)",
                    processed, total, batch_count
                );
            }
        }

        let bytes = writer.close().await?;
        if let Some(progress) = &self.progress {
            progress.finish();
        }

        let checkpoint = checkpoint::create_checkpoint(
            self.checkpoints.as_ref(),
            index,
            Cursor::Timestamp(run_start),
            schema,
        )
        .await?;

        let output = ExportOutput {
            bytes,
            format,
            checkpoint,
            documents: writer.documents_written() as u64,
        };
        if let Some((cache, key)) = &cached {
            cache.put(key, output.clone()).await;
        }

        info!(
            "Export completed: {} documents, {} bytes, {} ms",
            output.documents,
            output.bytes.len(),
            start_time.elapsed().as_millis()
        );
        Ok(Some(output))
    }

    /// Latest checkpoint of `index`, unless its cursor is stale
    async fn latest_valid(&self, index: &ExportIndex) -> Result<Option<Checkpoint>> {
        let Some(latest) = checkpoint::latest(self.checkpoints.as_ref(), index).await? else {
            return Ok(None);
        };
        if latest.cursor.sequence().is_none() {
            return Ok(Some(latest));
        }
        let store_max = self.source.current_max_sequence().await?;
        Ok(checkpoint::validate(&latest, &store_max).cloned())
    }

    async fn pinned_checkpoint(&self, id: Uuid, index: &ExportIndex) -> Result<Checkpoint> {
        match self.checkpoints.get(id).await? {
            Some(checkpoint) if checkpoint.index == *index => Ok(checkpoint),
            Some(checkpoint) => Err(ConfigError::InvalidValue {
                field: "previous".to_string(),
                value: format!("checkpoint {id} belongs to {}", checkpoint.index),
            }
            .into()),
            None => Err(ConfigError::InvalidValue {
                field: "previous".to_string(),
                value: format!("no checkpoint {id}"),
            }
            .into()),
        }
    }

    async fn record_schema(
        &self,
        index: &ExportIndex,
        previous: Option<&Checkpoint>,
        run_start: chrono::DateTime<Utc>,
    ) -> Result<Option<Checkpoint>> {
        match self
            .compute_latest_schema(index, previous, &DocumentFilter::all())
            .await?
        {
            Some(schema) => {
                let checkpoint = checkpoint::create_checkpoint(
                    self.checkpoints.as_ref(),
                    index,
                    Cursor::Timestamp(run_start),
                    schema,
                )
                .await?;
                Ok(Some(checkpoint))
            }
            None => {
                debug!("No documents for {}, no checkpoint created", index);
                Ok(None)
            }
        }
    }
}
