//! Market-data records at each stage of the pipeline
//!
//! `RawDocument` is what the upstream store hands over, `MarketRecord` is
//! the flattened typed row and `EnrichedRecord` adds the trailing-window
//! statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{HostField, StructuralError};
use crate::ids::{CoinId, RecordId};

/// One captured JSON document plus the two host-assigned fields.
///
/// The host fields are optional here so that a document lacking them can
/// still be enumerated and reported instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub record_id: Option<RecordId>,
    #[serde(default)]
    pub ingested_at: Option<DateTime<Utc>>,
    #[serde(alias = "json_data")]
    pub body: Value,
}

impl RawDocument {
    pub fn new(record_id: RecordId, ingested_at: DateTime<Utc>, body: Value) -> Self {
        Self {
            record_id: Some(record_id),
            ingested_at: Some(ingested_at),
            body,
        }
    }

    /// Capture a body now, assigning the same defaults the upstream store
    /// does: a fresh UUID and the current UTC instant.
    pub fn capture(body: Value) -> Self {
        Self::new(RecordId::generate(), Utc::now(), body)
    }

    /// Both host fields, or the structural error naming the missing one.
    pub fn host_fields(&self) -> Result<(&RecordId, DateTime<Utc>), StructuralError> {
        match (&self.record_id, self.ingested_at) {
            (Some(id), Some(at)) => Ok((id, at)),
            (None, _) => Err(StructuralError::MissingHostField {
                field: HostField::RecordId,
            }),
            (Some(id), None) => Err(StructuralError::MissingHostFieldFor {
                field: HostField::IngestedAt,
                record_id: id.clone(),
            }),
        }
    }
}

/// Flattened, typed market-data row. Every JSON-derived field is nullable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub record_id: RecordId,
    pub ingested_at: DateTime<Utc>,
    pub coin_id: Option<CoinId>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub price_usd: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub price_change_pct_24h: Option<f64>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl MarketRecord {
    /// A record with only the host fields and partition key set.
    pub fn bare(record_id: RecordId, ingested_at: DateTime<Utc>, coin_id: Option<CoinId>) -> Self {
        Self {
            record_id,
            ingested_at,
            coin_id,
            symbol: None,
            name: None,
            price_usd: None,
            market_cap: None,
            volume_24h: None,
            high_24h: None,
            low_24h: None,
            price_change_pct_24h: None,
            last_updated_at: None,
        }
    }

    pub fn with_price(mut self, price_usd: Option<f64>) -> Self {
        self.price_usd = price_usd;
        self
    }
}

/// A market record plus its trailing seven-observation statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: MarketRecord,
    pub moving_avg_7d: Option<f64>,
    /// Sample standard deviation (n - 1 divisor)
    pub volatility_7d: Option<f64>,
}
