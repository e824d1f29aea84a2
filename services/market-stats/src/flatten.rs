//! Flattener: one raw JSON document in, one typed record out
//!
//! Each output field is read from the document body by JSON pointer path
//! and coerced to its declared type. A field that is absent, null or not
//! coercible becomes null; only a missing host field rejects the document.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;
use types::errors::{FieldCoercionError, StructuralError};
use types::ids::CoinId;
use types::record::{MarketRecord, RawDocument};

/// JSON pointer paths for every flattened field.
///
/// Defaults follow the CoinGecko `coins/markets` payload. Paths given in
/// dotted form (`market.price`) are accepted and converted to pointers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    pub coin_id: String,
    pub symbol: String,
    pub name: String,
    pub price_usd: String,
    pub market_cap: String,
    pub volume_24h: String,
    pub high_24h: String,
    pub low_24h: String,
    pub price_change_pct_24h: String,
    pub last_updated_at: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            coin_id: "/id".to_string(),
            symbol: "/symbol".to_string(),
            name: "/name".to_string(),
            price_usd: "/current_price".to_string(),
            market_cap: "/market_cap".to_string(),
            volume_24h: "/total_volume".to_string(),
            high_24h: "/high_24h".to_string(),
            low_24h: "/low_24h".to_string(),
            price_change_pct_24h: "/price_change_percentage_24h".to_string(),
            last_updated_at: "/last_updated".to_string(),
        }
    }
}

/// A flattened record together with the fields that degraded to null.
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
    pub record: MarketRecord,
    pub coercion_failures: Vec<FieldCoercionError>,
}

/// Stateless document flattener.
#[derive(Debug, Clone, Default)]
pub struct Flattener {
    fields: FieldMap,
}

impl Flattener {
    pub fn new(fields: FieldMap) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Flatten a document, discarding coercion diagnostics.
    pub fn flatten(&self, doc: &RawDocument) -> Result<MarketRecord, StructuralError> {
        self.flatten_with_diagnostics(doc).map(|f| f.record)
    }

    /// Flatten a document and report every field that degraded to null.
    pub fn flatten_with_diagnostics(&self, doc: &RawDocument) -> Result<Flattened, StructuralError> {
        let (record_id, ingested_at) = doc.host_fields()?;
        let f = &self.fields;
        let mut c = Coercer::new(&doc.body);

        let record = MarketRecord {
            record_id: record_id.clone(),
            ingested_at,
            coin_id: c.string("coin_id", &f.coin_id).map(CoinId::new),
            symbol: c.string("symbol", &f.symbol),
            name: c.string("name", &f.name),
            price_usd: c.float("price_usd", &f.price_usd),
            market_cap: c.float("market_cap", &f.market_cap),
            volume_24h: c.float("volume_24h", &f.volume_24h),
            high_24h: c.float("high_24h", &f.high_24h),
            low_24h: c.float("low_24h", &f.low_24h),
            price_change_pct_24h: c.float("price_change_pct_24h", &f.price_change_pct_24h),
            last_updated_at: c.timestamp("last_updated_at", &f.last_updated_at),
        };

        for failure in &c.failures {
            debug!(
                record_id = %record.record_id,
                field = failure.field,
                path = %failure.path,
                found = %failure.found,
                "Field coerced to null"
            );
        }

        Ok(Flattened {
            record,
            coercion_failures: c.failures,
        })
    }
}

/// Flatten with the default field map.
pub fn flatten(doc: &RawDocument) -> Result<MarketRecord, StructuralError> {
    Flattener::default().flatten(doc)
}

/// Collects coercion failures while reading fields from one body.
struct Coercer<'a> {
    body: &'a Value,
    failures: Vec<FieldCoercionError>,
}

impl<'a> Coercer<'a> {
    fn new(body: &'a Value) -> Self {
        Self {
            body,
            failures: Vec::new(),
        }
    }

    fn lookup(&self, path: &str) -> Option<&'a Value> {
        let value = if path.starts_with('/') || path.is_empty() {
            self.body.pointer(path)
        } else {
            self.body.pointer(&dotted_to_pointer(path))
        };
        value.filter(|v| !v.is_null())
    }

    fn fail(&mut self, field: &'static str, path: &str, expected: &'static str, found: &Value) {
        self.failures.push(FieldCoercionError {
            field,
            path: path.to_string(),
            expected,
            found: found.to_string(),
        });
    }

    fn float(&mut self, field: &'static str, path: &str) -> Option<f64> {
        let value = self.lookup(path)?;
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed.filter(|x| x.is_finite()) {
            Some(x) => Some(x),
            None => {
                self.fail(field, path, "float", value);
                None
            }
        }
    }

    fn string(&mut self, field: &'static str, path: &str) -> Option<String> {
        let value = self.lookup(path)?;
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => {
                self.fail(field, path, "string", value);
                None
            }
        }
    }

    fn timestamp(&mut self, field: &'static str, path: &str) -> Option<DateTime<Utc>> {
        let value = self.lookup(path)?;
        let parsed = match value {
            Value::String(s) => parse_timestamp(s.trim()),
            Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            _ => None,
        };
        if parsed.is_none() {
            self.fail(field, path, "timestamp", value);
        }
        parsed
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn dotted_to_pointer(path: &str) -> String {
    path.split('.')
        .map(|seg| seg.replace('~', "~0").replace('/', "~1"))
        .fold(String::new(), |mut acc, seg| {
            acc.push('/');
            acc.push_str(&seg);
            acc
        })
}
