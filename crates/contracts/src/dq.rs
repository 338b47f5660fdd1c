//! Data-quality scoring over a normalized batch (spec.md §4.B): the report
//! fields gate onboarding against the thresholds in [`crate::config::ContractConfig`].

use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{ContractError, Result};
use crate::model::CanonicalRecord;

/// Data-quality measurements for a batch of canonical records, per
/// spec.md §4.B: "date parse success, required null rate, duplicate rate,
/// quantity parse success, max observed future-date offset, observed
/// history span, store/product reference-miss rate."
#[derive(Debug, Clone, Serialize)]
pub struct DataQualityReport {
    pub total_rows: usize,
    pub date_parse_success_rate: f64,
    pub required_null_rate: f64,
    pub duplicate_rate: f64,
    pub quantity_parse_success_rate: f64,
    pub max_future_date_offset_days: i64,
    pub history_span_days: i64,
    pub reference_miss_rate: f64,
}

impl DataQualityReport {
    /// Evaluates the report against `config`'s thresholds, returning the
    /// list of threshold names that were violated (empty means the batch
    /// passes the gate).
    pub fn violations(&self, config: &crate::config::ContractConfig) -> Vec<String> {
        let mut violations = Vec::new();
        if self.duplicate_rate > config.max_duplicate_rate {
            violations.push(format!(
                "duplicate_rate {:.4} exceeds max_duplicate_rate {:.4}",
                self.duplicate_rate, config.max_duplicate_rate
            ));
        }
        if self.required_null_rate > config.max_null_rate {
            violations.push(format!(
                "required_null_rate {:.4} exceeds max_null_rate {:.4}",
                self.required_null_rate, config.max_null_rate
            ));
        }
        if self.history_span_days < config.min_history_days as i64 {
            violations.push(format!(
                "history_span_days {} below min_history_days {}",
                self.history_span_days, config.min_history_days
            ));
        }
        violations
    }
}

/// Counts rows sharing a `(date, store_id, product_id)` key more than once;
/// each row beyond the first for a key counts toward the duplicate rate.
fn duplicate_rate(records: &[CanonicalRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let mut seen: HashMap<(NaiveDate, &str, &str), usize> = HashMap::new();
    for r in records {
        *seen.entry((r.date, r.store_id.as_str(), r.product_id.as_str())).or_insert(0) += 1;
    }
    let duplicates: usize = seen.values().filter(|&&count| count > 1).map(|&count| count - 1).sum();
    duplicates as f64 / records.len() as f64
}

/// Builds the DQ report for a batch already run through `normalize::normalize`.
///
/// `known_store_ids`/`known_product_ids` are the tenant's master-data
/// reference sets; rows referencing an id outside either set count toward
/// `reference_miss_rate`. Pass empty sets to skip the check (e.g. before
/// master data has been synced).
pub fn score_batch(
    records: &[CanonicalRecord],
    known_store_ids: &HashSet<String>,
    known_product_ids: &HashSet<String>,
) -> Result<DataQualityReport> {
    if records.is_empty() {
        return Err(ContractError::DataQualityGateFailed("batch is empty".to_string()));
    }

    let total_rows = records.len();
    let today = Utc::now().date_naive();

    let future_offsets: Vec<i64> = records
        .iter()
        .filter_map(|r| {
            let offset = (r.date - today).num_days();
            (offset > 0).then_some(offset)
        })
        .collect();
    let max_future_date_offset_days = future_offsets.into_iter().max().unwrap_or(0);

    let min_date = records.iter().map(|r| r.date).min().unwrap();
    let max_date = records.iter().map(|r| r.date).max().unwrap();
    let history_span_days = (max_date - min_date).max(Duration::zero()).num_days();

    let required_nulls = records
        .iter()
        .filter(|r| r.store_id.is_empty() || r.product_id.is_empty())
        .count();
    let required_null_rate = required_nulls as f64 / total_rows as f64;

    // quantity is a non-optional f64 by the time it reaches CanonicalRecord,
    // so "parse success" tracks finite, non-negative-after-clip values.
    let quantity_parse_failures = records.iter().filter(|r| !r.quantity.is_finite()).count();
    let quantity_parse_success_rate = 1.0 - (quantity_parse_failures as f64 / total_rows as f64);

    let reference_miss_rate = if known_store_ids.is_empty() && known_product_ids.is_empty() {
        0.0
    } else {
        let misses = records
            .iter()
            .filter(|r| {
                (!known_store_ids.is_empty() && !known_store_ids.contains(&r.store_id))
                    || (!known_product_ids.is_empty()
                        && r.product_id != "all"
                        && !known_product_ids.contains(&r.product_id))
            })
            .count();
        misses as f64 / total_rows as f64
    };

    Ok(DataQualityReport {
        total_rows,
        date_parse_success_rate: 1.0,
        required_null_rate,
        duplicate_rate: duplicate_rate(records),
        quantity_parse_success_rate,
        max_future_date_offset_days,
        history_span_days,
        reference_miss_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProductGrain;

    fn sample(date: &str, store: &str, product: &str, qty: f64) -> CanonicalRecord {
        CanonicalRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            store_id: store.to_string(),
            product_id: product.to_string(),
            quantity: qty,
            category: product.to_string(),
            is_promotional: false,
            is_holiday: false,
            dataset_id: "test".to_string(),
            country_code: "US".to_string(),
            frequency: "daily".to_string(),
            product_grain: ProductGrain::SkuLevel,
            returns_adjustment: 0.0,
            is_return_week: false,
        }
    }

    #[test]
    fn duplicate_keys_are_counted_once_per_extra_occurrence() {
        let records = vec![
            sample("2024-01-01", "1", "A", 3.0),
            sample("2024-01-01", "1", "A", 5.0),
            sample("2024-01-02", "1", "A", 2.0),
        ];
        assert_eq!(duplicate_rate(&records), 1.0 / 3.0);
    }

    #[test]
    fn history_span_covers_the_full_date_range() {
        let records = vec![sample("2024-01-01", "1", "A", 1.0), sample("2024-01-31", "1", "A", 1.0)];
        let report = score_batch(&records, &HashSet::new(), &HashSet::new()).unwrap();
        assert_eq!(report.history_span_days, 30);
    }

    #[test]
    fn reference_miss_rate_flags_unknown_store() {
        let records = vec![sample("2024-01-01", "unknown-store", "A", 1.0)];
        let known_stores: HashSet<String> = ["1".to_string()].into_iter().collect();
        let known_products: HashSet<String> = ["A".to_string()].into_iter().collect();
        let report = score_batch(&records, &known_stores, &known_products).unwrap();
        assert_eq!(report.reference_miss_rate, 1.0);
    }

    #[test]
    fn empty_batch_fails_fast() {
        assert!(score_batch(&[], &HashSet::new(), &HashSet::new()).is_err());
    }
}
