//! Market Statistics Service
//!
//! Turns periodic market-data snapshots into typed records and enriches
//! each record with trailing seven-observation statistics of its coin:
//! - Flattening of raw JSON documents with per-field null degradation
//! - Batch ingestion with structural rejection reporting
//! - Per-coin windowed moving average and sample standard deviation
//! - Output checksums for run-to-run determinism checks
//!
//! # Architecture
//!
//! ```text
//! RawDocument ──► Flattener ──► MarketRecord ──► WindowedAggregator ──► EnrichedRecord
//!                    │                               │
//!               Rejection                    IntegrityError
//! ```

pub mod aggregator;
pub mod checksum;
pub mod config;
pub mod flatten;
pub mod ingestion;
pub mod metrics;
pub mod pipeline;
pub mod source;
pub mod window;

pub use aggregator::{aggregate, WindowedAggregator};
pub use flatten::{flatten, Flattener};
pub use pipeline::{run_batch, BatchOutput, BatchReport, Pipeline};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
