//! Batched document streaming
//!
//! Wraps the lazy stream a [`DocumentSource`](crate::source::DocumentSource)
//! returns and hands documents out in fixed-size batches, so an export never
//! holds more than one batch in memory.

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use crate::error::Result;
use crate::source::Document;

/// Pull-based batches over a document stream
pub struct DocumentStream<'a> {
    inner: Option<BoxStream<'a, Result<Document>>>,
    batch_size: usize,
    total_fetched: u64,
}

impl<'a> DocumentStream<'a> {
    /// # Arguments
    /// * `inner` - Document stream from the source
    /// * `batch_size` - Documents per batch (at least one)
    pub fn new(inner: BoxStream<'a, Result<Document>>, batch_size: usize) -> Self {
        Self {
            inner: Some(inner),
            batch_size: batch_size.max(1),
            total_fetched: 0,
        }
    }

    /// Fetch the next batch of documents
    ///
    /// # Returns
    /// * `Result<Option<Vec<Document>>>` - Next batch, or None once exhausted
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(None);
        };

        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match inner.next().await {
                Some(Ok(doc)) => batch.push(doc),
                Some(Err(e)) => {
                    // release the source stream on error
                    self.inner = None;
                    return Err(e);
                }
                None => break,
            }
        }

        if batch.is_empty() {
            debug!("Document stream exhausted after {} documents", self.total_fetched);
            self.inner = None;
            Ok(None)
        } else {
            self.total_fetched += batch.len() as u64;
            debug!(
                "Fetched batch of {} documents (total: {})",
                batch.len(),
                self.total_fetched
            );
            Ok(Some(batch))
        }
    }

    /// Documents handed out so far
    pub fn total_fetched(&self) -> u64 {
        self.total_fetched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;
    use futures::stream;
    use serde_json::json;

    #[tokio::test]
    async fn test_batches() {
        let docs: Vec<Result<Document>> = (0..5).map(|i| Ok(json!({"n": i}))).collect();
        let mut stream = DocumentStream::new(stream::iter(docs).boxed(), 2);

        let mut sizes = Vec::new();
        while let Some(batch) = stream.next_batch().await.unwrap() {
            sizes.push(batch.len());
        }
        assert_eq!(sizes, [2, 2, 1]);
        assert_eq!(stream.total_fetched(), 5);
        assert!(stream.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let docs: Vec<Result<Document>> = vec![
            Ok(json!({})),
            Err(ExportError::Source("connection reset".into())),
            Ok(json!({})),
        ];
        let mut stream = DocumentStream::new(stream::iter(docs).boxed(), 10);
        assert!(stream.next_batch().await.is_err());
        assert!(stream.next_batch().await.unwrap().is_none());
    }
}
