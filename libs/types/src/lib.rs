//! Types library for the market statistics pipeline
//!
//! Shared definitions for every stage between the upstream document store
//! and the downstream consumer of enriched records.
//!
//! # Modules
//! - `ids`: Identifiers (RecordId, CoinId)
//! - `record`: RawDocument, MarketRecord, EnrichedRecord
//! - `errors`: Error taxonomy

pub mod ids;
pub mod record;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::record::*;
    pub use crate::errors::*;
}
