//! Batch ingestion front end
//!
//! Enumerates raw documents for one batch and flattens each of them.
//! A document missing a host field is rejected with its position in the
//! source and processing continues with the next one; field-level
//! coercion failures are only counted.

use tracing::{debug, info, warn};
use types::errors::{PipelineError, StructuralError};
use types::record::{MarketRecord, RawDocument};

use crate::config::IngestionConfig;
use crate::flatten::Flattener;

/// A document that could not be flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Zero-based position of the document in the source.
    pub position: usize,
    pub error: StructuralError,
}

/// Outcome of ingesting one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestedBatch {
    pub records: Vec<MarketRecord>,
    pub rejections: Vec<Rejection>,
    pub documents_seen: usize,
    /// Fields that degraded to null across the batch.
    pub coercion_failures: usize,
}

/// Flattens an enumerable source of raw documents.
#[derive(Debug, Clone, Default)]
pub struct BatchIngester {
    flattener: Flattener,
    config: IngestionConfig,
}

impl BatchIngester {
    pub fn new(config: IngestionConfig, flattener: Flattener) -> Self {
        info!(
            reject_empty_batch = config.reject_empty_batch,
            "BatchIngester initialized"
        );
        Self { flattener, config }
    }

    /// Create an ingester with default configuration and field map.
    pub fn with_defaults() -> Self {
        Self::new(IngestionConfig::default(), Flattener::default())
    }

    /// Flatten every document of the batch.
    ///
    /// Only an empty batch (when configured to reject it) fails the call;
    /// structural problems are returned as rejections.
    pub fn ingest<I>(&self, documents: I) -> Result<IngestedBatch, PipelineError>
    where
        I: IntoIterator<Item = RawDocument>,
    {
        let mut batch = IngestedBatch::default();

        for (position, doc) in documents.into_iter().enumerate() {
            batch.documents_seen += 1;
            match self.flattener.flatten_with_diagnostics(&doc) {
                Ok(flattened) => {
                    batch.coercion_failures += flattened.coercion_failures.len();
                    debug!(
                        position,
                        record_id = %flattened.record.record_id,
                        degraded_fields = flattened.coercion_failures.len(),
                        "Document flattened"
                    );
                    batch.records.push(flattened.record);
                }
                Err(error) => {
                    warn!(
                        position,
                        record_id = error.record_id().map(|id| id.as_str()).unwrap_or("<none>"),
                        missing = %error.field(),
                        "Rejecting document"
                    );
                    batch.rejections.push(Rejection { position, error });
                }
            }
        }

        if batch.documents_seen == 0 && self.config.reject_empty_batch {
            warn!("Upstream batch contained no documents");
            return Err(PipelineError::EmptyBatch);
        }

        info!(
            documents = batch.documents_seen,
            records = batch.records.len(),
            rejected = batch.rejections.len(),
            coercion_failures = batch.coercion_failures,
            "Batch ingested"
        );

        Ok(batch)
    }
}
