//! The canonical transaction schema (spec.md §4.B) and the loosely-typed
//! raw row shape every dataset-specific normalizer maps into it.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed column set every canonical transaction row carries, in the order
/// the original contract emits them.
pub const CANONICAL_BASE_COLS: [&str; 13] = [
    "date",
    "store_id",
    "product_id",
    "quantity",
    "category",
    "is_promotional",
    "is_holiday",
    "dataset_id",
    "country_code",
    "frequency",
    "product_grain",
    "returns_adjustment",
    "is_return_week",
];

/// Columns that must be present (or derivable) on the raw row before
/// normalization is attempted; their absence is a hard ingestion failure.
pub const CANONICAL_REQUIRED_COLS: [&str; 4] = ["date", "store_id", "product_id", "quantity"];

/// Grain a product dimension is recorded at. `StoreLevelOnly` marks
/// datasets (Rossmann-style) with no per-product breakdown at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductGrain {
    SkuLevel,
    StoreLevelOnly,
}

impl ProductGrain {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductGrain::SkuLevel => "sku_level",
            ProductGrain::StoreLevelOnly => "store_level_only",
        }
    }
}

impl std::fmt::Display for ProductGrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single normalized transaction row meeting the canonical contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub date: NaiveDate,
    pub store_id: String,
    pub product_id: String,
    pub quantity: f64,
    pub category: String,
    pub is_promotional: bool,
    pub is_holiday: bool,
    pub dataset_id: String,
    pub country_code: String,
    pub frequency: String,
    pub product_grain: ProductGrain,
    pub returns_adjustment: f64,
    pub is_return_week: bool,
}

/// A loosely-typed input row: field name → JSON value, as produced by a
/// CSV reader or ingestion adapter before dataset-specific renaming.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow(pub HashMap<String, Value>);

impl RawRow {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.0.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn get_bool_as_flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            Value::String(s) => {
                let s = s.trim().to_ascii_lowercase();
                match s.as_str() {
                    "1" | "true" | "yes" | "y" => Some(true),
                    "0" | "false" | "no" | "n" | "" => Some(false),
                    _ => s.parse::<f64>().ok().map(|f| f != 0.0),
                }
            }
            _ => None,
        }
    }

    /// Renames a raw column in place, leaving the original key untouched if
    /// it isn't present. Later `insert` calls win when both the source and
    /// destination key are already populated.
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(value) = self.0.remove(from) {
            self.0.entry(to.to_string()).or_insert(value);
        }
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }
}

/// Which source-dataset layout a batch of raw rows was mapped from.
/// `load_canonical_transactions`-equivalent dispatch in `normalize.rs`
/// picks one of these by file/column presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Favorita,
    Walmart,
    Rossmann,
    SeedSynthetic,
    Generic,
}

impl DatasetKind {
    pub fn dataset_id(&self) -> &'static str {
        match self {
            DatasetKind::Favorita => "favorita",
            DatasetKind::Walmart => "walmart",
            DatasetKind::Rossmann => "rossmann",
            DatasetKind::SeedSynthetic => "seed_synthetic",
            DatasetKind::Generic => "generic",
        }
    }

    pub fn country_code(&self) -> &'static str {
        match self {
            DatasetKind::Favorita => "EC",
            DatasetKind::Walmart => "US",
            DatasetKind::Rossmann => "DE",
            DatasetKind::SeedSynthetic => "US",
            DatasetKind::Generic => "unknown",
        }
    }

    pub fn frequency(&self) -> &'static str {
        match self {
            DatasetKind::Favorita => "daily",
            DatasetKind::Walmart => "weekly",
            DatasetKind::Rossmann => "daily",
            DatasetKind::SeedSynthetic => "daily",
            DatasetKind::Generic => "unknown",
        }
    }
}
