//! Windowed Aggregator
//!
//! Groups flattened records by `coin_id`, orders each group by
//! (`ingested_at`, `record_id`) and scans it once with a trailing window,
//! attaching `moving_avg_7d` and `volatility_7d` to every record.
//!
//! Partitions share no state. Output is grouped by partition in ascending
//! `coin_id` order (records without a coin first) so that repeated runs over
//! the same set produce identical sequences regardless of arrival order.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info, warn};
use types::errors::IntegrityError;
use types::ids::{CoinId, RecordId};
use types::record::{EnrichedRecord, MarketRecord};

use crate::config::AggregatorConfig;
use crate::window::TrailingWindow;

/// Partition key. `None` collects records whose coin could not be read.
pub type PartitionKey = Option<CoinId>;

/// Batch windowed aggregator.
#[derive(Debug, Clone, Default)]
pub struct WindowedAggregator {
    config: AggregatorConfig,
}

impl WindowedAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// Enrich every record with its trailing-window statistics.
    ///
    /// Fails with the first integrity violation in partition order.
    pub fn aggregate(&self, records: Vec<MarketRecord>) -> Result<Vec<EnrichedRecord>, IntegrityError> {
        let record_count = records.len();
        let partitions: Vec<(PartitionKey, Vec<MarketRecord>)> =
            partition(records).into_iter().collect();

        if let Some((None, unkeyed)) = partitions.first() {
            warn!(
                records = unkeyed.len(),
                "Records without coin_id aggregated as their own partition"
            );
        }

        info!(
            records = record_count,
            partitions = partitions.len(),
            parallel = self.config.parallel,
            "Aggregating trailing windows"
        );

        let results: Vec<Result<Vec<EnrichedRecord>, IntegrityError>> = if self.config.parallel {
            partitions
                .into_par_iter()
                .map(|(key, group)| enrich_partition(key, group))
                .collect()
        } else {
            partitions
                .into_iter()
                .map(|(key, group)| enrich_partition(key, group))
                .collect()
        };

        let mut enriched = Vec::with_capacity(record_count);
        for result in results {
            enriched.extend(result?);
        }
        Ok(enriched)
    }
}

/// Aggregate with the default configuration.
pub fn aggregate(records: Vec<MarketRecord>) -> Result<Vec<EnrichedRecord>, IntegrityError> {
    WindowedAggregator::default().aggregate(records)
}

/// Group records by coin; `BTreeMap` keeps partition iteration deterministic.
pub fn partition(records: Vec<MarketRecord>) -> BTreeMap<PartitionKey, Vec<MarketRecord>> {
    let mut groups: BTreeMap<PartitionKey, Vec<MarketRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.coin_id.clone()).or_default().push(record);
    }
    groups
}

/// Sort one partition and run the trailing window over it.
fn enrich_partition(
    key: PartitionKey,
    mut records: Vec<MarketRecord>,
) -> Result<Vec<EnrichedRecord>, IntegrityError> {
    records.sort_by(|a, b| {
        a.ingested_at
            .cmp(&b.ingested_at)
            .then_with(|| a.record_id.cmp(&b.record_id))
    });

    check_unique_ids(&key, &records)?;

    let mut window = TrailingWindow::new();
    let enriched: Vec<EnrichedRecord> = records
        .into_iter()
        .map(|record| {
            let stats = window.push(record.price_usd);
            EnrichedRecord {
                record,
                moving_avg_7d: stats.mean,
                volatility_7d: stats.stddev,
            }
        })
        .collect();

    debug!(
        coin_id = key.as_ref().map(CoinId::as_str).unwrap_or("<null>"),
        records = enriched.len(),
        "Partition enriched"
    );
    Ok(enriched)
}

fn check_unique_ids(key: &PartitionKey, records: &[MarketRecord]) -> Result<(), IntegrityError> {
    let mut counts: BTreeMap<&RecordId, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(&record.record_id).or_default() += 1;
    }

    let duplicates: Vec<RecordId> = counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(id, _)| id.clone())
        .collect();

    if duplicates.is_empty() {
        return Ok(());
    }

    warn!(
        coin_id = key.as_ref().map(CoinId::as_str).unwrap_or("<null>"),
        duplicates = duplicates.len(),
        "Duplicate record_id within partition"
    );
    Err(IntegrityError::DuplicateRecordId {
        coin_id: key.clone(),
        record_ids: duplicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(minute: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_709_294_400 + minute * 60, 0).unwrap()
    }

    fn rec(id: &str, coin: &str, minute: i64, price: Option<f64>) -> MarketRecord {
        MarketRecord::bare(RecordId::new(id), ts(minute), Some(CoinId::new(coin))).with_price(price)
    }

    fn series(coin: &str, prices: &[f64]) -> Vec<MarketRecord> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| rec(&format!("{coin}-{i:03}"), coin, i as i64, Some(*p)))
            .collect()
    }

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn test_worked_example() {
        let out = aggregate(series("bitcoin", &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0])).unwrap();
        assert_eq!(out.len(), 7);

        assert!(close(out[2].moving_avg_7d, 20.0));
        assert!(close(out[2].volatility_7d, 10.0));

        assert!(close(out[6].moving_avg_7d, 40.0));
        assert!(close(out[6].volatility_7d, (2800.0_f64 / 6.0).sqrt()));
    }

    #[test]
    fn test_single_record_partition() {
        let out = aggregate(vec![rec("only", "bitcoin", 0, Some(100.0))]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].moving_avg_7d, Some(100.0));
        assert_eq!(out[0].volatility_7d, None);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_sorts_by_ingestion_time() {
        let mut records = series("eth", &[1.0, 2.0, 3.0]);
        records.reverse();
        let out = aggregate(records).unwrap();
        let ids: Vec<&str> = out.iter().map(|e| e.record.record_id.as_str()).collect();
        assert_eq!(ids, vec!["eth-000", "eth-001", "eth-002"]);
        assert!(close(out[1].moving_avg_7d, 1.5));
    }

    #[test]
    fn test_ties_broken_by_record_id() {
        let records = vec![
            rec("b", "eth", 0, Some(20.0)),
            rec("a", "eth", 0, Some(10.0)),
        ];
        let out = aggregate(records).unwrap();
        assert_eq!(out[0].record.record_id.as_str(), "a");
        assert_eq!(out[0].moving_avg_7d, Some(10.0));
        assert_eq!(out[1].moving_avg_7d, Some(15.0));
    }

    #[test]
    fn test_window_never_crosses_partitions() {
        let mut records = series("aaa", &[1.0, 1.0, 1.0]);
        records.extend(series("bbb", &[1000.0, 2000.0]));
        let out = aggregate(records).unwrap();

        let bbb: Vec<&EnrichedRecord> = out
            .iter()
            .filter(|e| e.record.coin_id == Some(CoinId::new("bbb")))
            .collect();
        assert_eq!(bbb[0].moving_avg_7d, Some(1000.0));
        assert_eq!(bbb[0].volatility_7d, None);
        assert_eq!(bbb[1].moving_avg_7d, Some(1500.0));
    }

    #[test]
    fn test_output_grouped_by_coin_order() {
        let mut records = series("zcash", &[1.0]);
        records.extend(series("bitcoin", &[2.0]));
        records.push(MarketRecord::bare(RecordId::new("orphan"), ts(0), None).with_price(Some(3.0)));

        let out = aggregate(records).unwrap();
        let coins: Vec<Option<&str>> = out
            .iter()
            .map(|e| e.record.coin_id.as_ref().map(CoinId::as_str))
            .collect();
        assert_eq!(coins, vec![None, Some("bitcoin"), Some("zcash")]);
        assert_eq!(out[0].moving_avg_7d, Some(3.0));
    }

    #[test]
    fn test_null_prices_degrade_to_null_aggregates() {
        let records = vec![
            rec("r0", "eth", 0, None),
            rec("r1", "eth", 1, Some(4.0)),
            rec("r2", "eth", 2, None),
            rec("r3", "eth", 3, Some(8.0)),
        ];
        let out = aggregate(records).unwrap();
        assert_eq!(out[0].moving_avg_7d, None);
        assert_eq!(out[0].volatility_7d, None);
        assert_eq!(out[1].moving_avg_7d, Some(4.0));
        assert_eq!(out[1].volatility_7d, None);
        assert_eq!(out[2].moving_avg_7d, Some(4.0));
        assert_eq!(out[3].moving_avg_7d, Some(6.0));
        assert!(close(out[3].volatility_7d, 8.0_f64.sqrt()));
    }

    #[test]
    fn test_window_drops_oldest_after_seven() {
        let prices: Vec<f64> = (1..=10).map(|p| p as f64).collect();
        let out = aggregate(series("sol", &prices)).unwrap();
        // positions 3..=9 -> prices 4..=10
        assert!(close(out[9].moving_avg_7d, 7.0));
    }

    #[test]
    fn test_non_finite_price_does_not_leak_into_later_windows() {
        let mut prices = vec![f64::INFINITY];
        prices.extend([1.0; 20]);
        let out = aggregate(series("btc", &prices)).unwrap();

        assert_eq!(out[0].moving_avg_7d, None);
        assert_eq!(out[1].moving_avg_7d, Some(1.0));
        // positions 4..=10 are all 1.0
        assert_eq!(out[10].moving_avg_7d, Some(1.0));
        assert_eq!(out[10].volatility_7d, Some(0.0));
    }

    #[test]
    fn test_duplicate_record_id_fails() {
        let records = vec![
            rec("dup", "bitcoin", 0, Some(1.0)),
            rec("ok", "bitcoin", 1, Some(2.0)),
            rec("dup", "bitcoin", 2, Some(3.0)),
        ];
        match aggregate(records).unwrap_err() {
            IntegrityError::DuplicateRecordId { coin_id, record_ids } => {
                assert_eq!(coin_id, Some(CoinId::new("bitcoin")));
                assert_eq!(record_ids, vec![RecordId::new("dup")]);
            }
        }
    }

    #[test]
    fn test_same_record_id_in_different_partitions_is_allowed() {
        let records = vec![
            rec("shared", "bitcoin", 0, Some(1.0)),
            rec("shared", "ethereum", 0, Some(2.0)),
        ];
        assert_eq!(aggregate(records).unwrap().len(), 2);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut records = Vec::new();
        for (c, coin) in ["ada", "btc", "eth", "sol", "xrp"].iter().enumerate() {
            let prices: Vec<f64> = (0..40).map(|i| 100.0 * (c + 1) as f64 + (i % 9) as f64).collect();
            records.extend(series(coin, &prices));
        }
        records.reverse();

        let sequential = aggregate(records.clone()).unwrap();
        let parallel = WindowedAggregator::new(AggregatorConfig { parallel: true })
            .aggregate(records)
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_partition_groups_by_coin() {
        let mut records = series("btc", &[1.0, 2.0]);
        records.extend(series("eth", &[3.0]));
        let groups = partition(records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&Some(CoinId::new("btc"))].len(), 2);
        assert_eq!(groups[&Some(CoinId::new("eth"))].len(), 1);
    }
}
