//! End-to-end batch run: raw documents in, enriched records out
//!
//! ```text
//! RawDocument source
//!        │
//!   ┌────▼─────┐
//!   │ Ingest   │  ← flatten, reject structurally broken documents
//!   └────┬─────┘
//!        │ MarketRecord
//!   ┌────▼─────┐
//!   │Aggregate │  ← partition by coin, order, trailing window
//!   └────┬─────┘
//!        │ EnrichedRecord
//!   ┌────▼─────┐
//!   │ Report   │  ← counts + output checksum
//!   └──────────┘
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info};
use types::errors::PipelineError;
use types::record::{EnrichedRecord, RawDocument};

use crate::aggregator::WindowedAggregator;
use crate::checksum::output_checksum;
use crate::config::PipelineConfig;
use crate::flatten::Flattener;
use crate::ingestion::{BatchIngester, Rejection};
use crate::metrics::PipelineMetrics;

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub documents_seen: usize,
    pub records_flattened: usize,
    pub rejected: usize,
    pub coercion_failures: usize,
    pub partitions: usize,
    pub records_enriched: usize,
    /// SHA-256 of the enriched output, for comparing runs.
    pub checksum: String,
}

/// Everything a batch run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutput {
    pub records: Vec<EnrichedRecord>,
    pub rejections: Vec<Rejection>,
    pub report: BatchReport,
}

/// Ingest-then-aggregate pipeline. Holds no state between batches apart
/// from cumulative metrics.
pub struct Pipeline {
    ingester: BatchIngester,
    aggregator: WindowedAggregator,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_flattener(config, Flattener::default())
    }

    /// Pipeline using a custom field map.
    pub fn with_flattener(config: PipelineConfig, flattener: Flattener) -> Self {
        Self {
            ingester: BatchIngester::new(config.ingestion, flattener),
            aggregator: WindowedAggregator::new(config.aggregator),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Run one complete batch.
    pub fn run_batch<I>(&self, documents: I) -> Result<BatchOutput, PipelineError>
    where
        I: IntoIterator<Item = RawDocument>,
    {
        let start = Instant::now();

        let result = self.run_inner(documents);
        match &result {
            Ok(output) => {
                let duration_us = start.elapsed().as_micros() as u64;
                self.metrics.record_batch(&output.report, duration_us);
                info!(
                    documents = output.report.documents_seen,
                    rejected = output.report.rejected,
                    partitions = output.report.partitions,
                    records = output.report.records_enriched,
                    duration_us,
                    checksum = %output.report.checksum,
                    "Batch completed"
                );
            }
            Err(e) => {
                self.metrics.record_failure();
                error!(error = %e, "Batch failed");
            }
        }
        result
    }

    fn run_inner<I>(&self, documents: I) -> Result<BatchOutput, PipelineError>
    where
        I: IntoIterator<Item = RawDocument>,
    {
        let batch = self.ingester.ingest(documents)?;
        let records_flattened = batch.records.len();

        let records = self.aggregator.aggregate(batch.records)?;

        let report = BatchReport {
            documents_seen: batch.documents_seen,
            records_flattened,
            rejected: batch.rejections.len(),
            coercion_failures: batch.coercion_failures,
            partitions: count_partitions(&records),
            records_enriched: records.len(),
            checksum: output_checksum(&records),
        };

        Ok(BatchOutput {
            records,
            rejections: batch.rejections,
            report,
        })
    }
}

/// Run one batch with a fresh pipeline.
pub fn run_batch<I>(documents: I, config: &PipelineConfig) -> Result<BatchOutput, PipelineError>
where
    I: IntoIterator<Item = RawDocument>,
{
    Pipeline::new(config.clone()).run_batch(documents)
}

/// Output is grouped by partition, so partitions are runs of equal coin_id.
fn count_partitions(records: &[EnrichedRecord]) -> usize {
    records
        .windows(2)
        .filter(|pair| pair[0].record.coin_id != pair[1].record.coin_id)
        .count()
        + usize::from(!records.is_empty())
}
