//! Dataset-specific column mapping plus the shared `finalize_contract` step
//! that enforces the canonical schema (spec.md §4.B), grounded in
//! `data_contracts.py`'s `_finalize_contract`/`_load_*` functions.

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{ContractError, Result};
use crate::model::{CanonicalRecord, DatasetKind, ProductGrain, RawRow, CANONICAL_REQUIRED_COLS};

/// Parses a row's `date` field, accepting the common `YYYY-MM-DD` and
/// `MM/DD/YYYY` layouts the source datasets use.
fn parse_date(raw: &RawRow) -> Option<NaiveDate> {
    let s = raw.get_str("date")?;
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%y"))
        .ok()
}

/// Enforces the canonical schema on an already dataset-renamed row:
/// required-column presence, quantity coercion, and column defaults,
/// mirroring `_finalize_contract`.
fn finalize_row(
    mut raw: RawRow,
    dataset_id: &str,
    country_code: &str,
    frequency: &str,
) -> Result<CanonicalRecord> {
    let missing: Vec<String> = CANONICAL_REQUIRED_COLS
        .iter()
        .filter(|col| raw.get(col).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ContractError::ContractMissingField(missing));
    }

    let date = parse_date(&raw).ok_or_else(|| {
        ContractError::ContractMissingField(vec!["date (unparseable)".to_string()])
    })?;

    let store_id = raw.get_str("store_id").unwrap_or_default();
    let product_id = raw.get_str("product_id").unwrap_or_default();
    let quantity = raw.get_f64("quantity").unwrap_or(0.0);

    let category = raw
        .get_str("category")
        .unwrap_or_else(|| product_id.clone());
    let is_promotional = raw.get_bool_as_flag("is_promotional").unwrap_or(false);
    let is_holiday = raw.get_bool_as_flag("is_holiday").unwrap_or(false);

    let product_grain = match raw.get_str("product_grain").as_deref() {
        Some("store_level_only") => ProductGrain::StoreLevelOnly,
        _ => ProductGrain::SkuLevel,
    };
    let returns_adjustment = raw.get_f64("returns_adjustment").unwrap_or(0.0);
    let is_return_week = raw.get_bool_as_flag("is_return_week").unwrap_or(false);

    Ok(CanonicalRecord {
        date,
        store_id,
        product_id,
        quantity,
        category,
        is_promotional,
        is_holiday,
        dataset_id: dataset_id.to_string(),
        country_code: country_code.to_string(),
        frequency: frequency.to_string(),
        product_grain,
        returns_adjustment,
        is_return_week,
    })
}

fn finalize_batch(
    rows: Vec<RawRow>,
    kind: DatasetKind,
) -> Result<Vec<CanonicalRecord>> {
    rows.into_iter()
        .map(|row| finalize_row(row, kind.dataset_id(), kind.country_code(), kind.frequency()))
        .collect()
}

/// Favorita-style layout: `store_nbr`, `family`, `sales`, `onpromotion`.
pub fn normalize_favorita(rows: Vec<RawRow>) -> Result<Vec<CanonicalRecord>> {
    let rows = rows
        .into_iter()
        .map(|mut row| {
            row.rename("store_nbr", "store_id");
            row.rename("family", "category");
            row.rename("family_id", "product_id");
            row.rename("sales", "quantity");
            row.rename("onpromotion", "is_promotional");
            if row.get("product_id").is_none() {
                if let Some(category) = row.get_str("category") {
                    row.set("product_id", Value::String(category));
                }
            }
            row
        })
        .collect();
    finalize_batch(rows, DatasetKind::Favorita)
}

/// Walmart-style layout: `Store`, `Dept`, `Weekly_Sales`, `Date`, `IsHoliday`.
///
/// Negative weekly sales (returns/adjustments) are routed to
/// `returns_adjustment` and flagged via `is_return_week`; the demand target
/// itself is clipped to non-negative.
pub fn normalize_walmart(rows: Vec<RawRow>) -> Result<Vec<CanonicalRecord>> {
    let rows = rows
        .into_iter()
        .map(|mut row| {
            row.rename("Store", "store_id");
            row.rename("Dept", "category");
            row.rename("Weekly_Sales", "quantity");
            row.rename("Date", "date");
            row.rename("IsHoliday", "is_holiday");

            let net_sales = row.get_f64("quantity").unwrap_or(0.0);
            row.set("returns_adjustment", Value::from(net_sales.min(0.0)));
            row.set("is_return_week", Value::from(net_sales < 0.0));
            row.set("quantity", Value::from(net_sales.max(0.0)));

            if let Some(category) = row.get_str("category") {
                row.set("product_id", Value::String(category));
            }
            row
        })
        .collect();
    finalize_batch(rows, DatasetKind::Walmart)
}

/// Rossmann-style layout: store-only sales with no per-product breakdown.
/// Every row is pinned to `product_id = "all"` and
/// `product_grain = "store_level_only"`.
pub fn normalize_rossmann(rows: Vec<RawRow>) -> Result<Vec<CanonicalRecord>> {
    let rows = rows
        .into_iter()
        .map(|mut row| {
            row.rename("Store", "store_id");
            row.rename("Sales", "quantity");
            row.rename("Date", "date");
            row.rename("Promo", "is_promotional");
            row.set("product_id", Value::String("all".to_string()));
            row.set("category", Value::String("all".to_string()));
            row.set("product_grain", Value::String("store_level_only".to_string()));
            row
        })
        .collect();
    finalize_batch(rows, DatasetKind::Rossmann)
}

/// Seed/synthetic transaction layout used by the demo dataset:
/// `STORE_NBR`, `ITEM_NBR`, `QTY_SOLD`, `TRANS_DATE`.
pub fn normalize_seed_transactions(rows: Vec<RawRow>) -> Result<Vec<CanonicalRecord>> {
    let rows = rows
        .into_iter()
        .map(|mut row| {
            row.rename("STORE_NBR", "store_id");
            row.rename("ITEM_NBR", "product_id");
            row.rename("QTY_SOLD", "quantity");
            row.rename("TRANS_DATE", "date");
            if let Some(product_id) = row.get_str("product_id") {
                row.set("category", Value::String(product_id));
            }
            row.set("is_promotional", Value::from(0));
            row
        })
        .collect();
    finalize_batch(rows, DatasetKind::SeedSynthetic)
}

/// Best-effort fallback for ad hoc flat files: recognizes the same column
/// aliases the dataset-specific mappers use and normalizes whichever are
/// present, defaulting `product_id` to `"all"` when no product dimension
/// can be recovered at all.
pub fn normalize_generic(rows: Vec<RawRow>) -> Result<Vec<CanonicalRecord>> {
    const ALIASES: &[(&str, &str)] = &[
        ("store_nbr", "store_id"),
        ("store", "store_id"),
        ("family", "category"),
        ("dept", "category"),
        ("item_nbr", "product_id"),
        ("sales", "quantity"),
        ("weekly_sales", "quantity"),
        ("qty_sold", "quantity"),
        ("trans_date", "date"),
        ("onpromotion", "is_promotional"),
        ("promo", "is_promotional"),
        ("isholiday", "is_holiday"),
    ];

    let rows = rows
        .into_iter()
        .map(|mut row| {
            for (from, to) in ALIASES {
                row.rename(from, to);
            }
            if row.get("product_id").is_none() {
                let fallback = row
                    .get_str("category")
                    .unwrap_or_else(|| "all".to_string());
                row.set("product_id", Value::String(fallback));
            }
            row
        })
        .collect();
    finalize_batch(rows, DatasetKind::Generic)
}

/// Dispatches to the matching normalizer for a known dataset kind.
pub fn normalize(kind: DatasetKind, rows: Vec<RawRow>) -> Result<Vec<CanonicalRecord>> {
    match kind {
        DatasetKind::Favorita => normalize_favorita(rows),
        DatasetKind::Walmart => normalize_walmart(rows),
        DatasetKind::Rossmann => normalize_rossmann(rows),
        DatasetKind::SeedSynthetic => normalize_seed_transactions(rows),
        DatasetKind::Generic => normalize_generic(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row(pairs: &[(&str, Value)]) -> RawRow {
        let mut map = HashMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        RawRow(map)
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let rows = vec![row(&[
            ("date", Value::String("2024-01-01".into())),
            ("store_id", Value::String("1".into())),
        ])];
        let result = normalize_generic(rows);
        assert!(matches!(result, Err(ContractError::ContractMissingField(_))));
    }

    #[test]
    fn walmart_negative_sales_become_returns_adjustment() {
        let rows = vec![row(&[
            ("Date", Value::String("2024-01-01".into())),
            ("Store", Value::from(12)),
            ("Dept", Value::from(3)),
            ("Weekly_Sales", Value::from(-42.5)),
        ])];
        let out = normalize_walmart(rows).expect("normalizes");
        assert_eq!(out.len(), 1);
        let rec = &out[0];
        assert_eq!(rec.quantity, 0.0);
        assert_eq!(rec.returns_adjustment, -42.5);
        assert!(rec.is_return_week);
    }

    #[test]
    fn walmart_positive_sales_have_no_return_flag() {
        let rows = vec![row(&[
            ("Date", Value::String("2024-01-01".into())),
            ("Store", Value::from(12)),
            ("Dept", Value::from(3)),
            ("Weekly_Sales", Value::from(120.0)),
        ])];
        let out = normalize_walmart(rows).expect("normalizes");
        assert_eq!(out[0].quantity, 120.0);
        assert_eq!(out[0].returns_adjustment, 0.0);
        assert!(!out[0].is_return_week);
    }

    #[test]
    fn rossmann_rows_are_pinned_to_store_level_only() {
        let rows = vec![row(&[
            ("Date", Value::String("2024-02-01".into())),
            ("Store", Value::from(5)),
            ("Sales", Value::from(900.0)),
        ])];
        let out = normalize_rossmann(rows).expect("normalizes");
        assert_eq!(out[0].product_id, "all");
        assert_eq!(out[0].product_grain, ProductGrain::StoreLevelOnly);
    }

    #[test]
    fn generic_fallback_defaults_product_id_when_absent() {
        let rows = vec![row(&[
            ("date", Value::String("2024-03-01".into())),
            ("store", Value::from(7)),
            ("sales", Value::from(5.0)),
        ])];
        let out = normalize_generic(rows).expect("normalizes");
        assert_eq!(out[0].product_id, "all");
    }
}
