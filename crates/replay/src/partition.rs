//! Time partitioning for the replay simulator, spec.md §4.K step 1.
//! Grounded on `examples/original_source/backend/scripts/run_replay_simulation.py`'s
//! `build_time_partition`/`write_partition_manifest` calls (the helper
//! modules themselves were not part of the retrieved source; the manifest
//! shape here is inferred from how `main()` consumes it).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct DatasetRow {
    pub date: NaiveDate,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFileDigest {
    pub path: String,
    pub row_count: usize,
    pub content_hash: String,
}

/// "emit a partition manifest (source files, row counts, hashes)",
/// spec.md §4.K step 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionManifest {
    pub dataset_id: String,
    pub train_end_date: NaiveDate,
    pub holdout_days: i64,
    pub train_row_count: usize,
    pub holdout_row_count: usize,
    pub source_files: Vec<SourceFileDigest>,
}

/// Splits `rows` at `max(date) - holdout_days`, matching the original's
/// "`train_end_date` derived from `holdout_days`" (no explicit
/// `train_end_date` override path is modeled; callers wanting a fixed
/// cutoff should filter `rows` first).
pub fn build_time_partition(rows: &[DatasetRow], holdout_days: i64, dataset_id: &str, source_files: Vec<SourceFileDigest>) -> Option<PartitionManifest> {
    let max_date = rows.iter().map(|r| r.date).max()?;
    let train_end_date = max_date - chrono::Duration::days(holdout_days);

    let train_row_count = rows.iter().filter(|r| r.date <= train_end_date).count();
    let holdout_row_count = rows.iter().filter(|r| r.date > train_end_date).count();

    Some(PartitionManifest { dataset_id: dataset_id.to_string(), train_end_date, holdout_days, train_row_count, holdout_row_count, source_files })
}

/// Per-file content digest for the manifest, using the same FNV-1a
/// technique as `shelfops_forecasting::arena`'s stable routing hash
/// (process- and version-stable, unlike `DefaultHasher`'s seed).
pub fn content_hash(bytes: &[u8]) -> String {
    let mut h: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        h ^= *byte as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    format!("{:016x}", h)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(y: i32, m: u32, d: u32, qty: f64) -> DatasetRow {
        DatasetRow { date: NaiveDate::from_ymd_opt(y, m, d).unwrap(), store_id: Uuid::new_v4(), product_id: Uuid::new_v4(), quantity: qty }
    }

    #[test]
    fn train_end_date_is_max_date_minus_holdout() {
        let rows = vec![row(2024, 1, 1, 1.0), row(2024, 1, 31, 2.0)];
        let manifest = build_time_partition(&rows, 10, "ds1", vec![]).unwrap();
        assert_eq!(manifest.train_end_date, NaiveDate::from_ymd_opt(2024, 1, 21).unwrap());
        assert_eq!(manifest.train_row_count, 1);
        assert_eq!(manifest.holdout_row_count, 1);
    }

    #[test]
    fn empty_rows_yield_no_manifest() {
        assert!(build_time_partition(&[], 10, "ds1", vec![]).is_none());
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
        assert_ne!(content_hash(b"hello"), content_hash(b"world"));
    }
}
