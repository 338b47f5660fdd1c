//! Two-tier typed feature schema, spec.md §4.D. Grounded on
//! `examples/original_source/backend/ml/features.py`: the 27 cold-start
//! columns and the 19 production-only columns it adds up to 46, matching
//! `ColdStartRow`/`ProductionRow` below field-for-field. Rolling sales
//! aggregates are computed with `polars` LazyFrames over an already-causal
//! slice, so it is a type error (not a runtime check) to hand the builder
//! data beyond the as-of date.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::error::{ForecastingError, Result};

/// Feature tier a model was trained on / a prediction call must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureTier {
    ColdStart,
    Production,
}

impl FeatureTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureTier::ColdStart => "cold_start",
            FeatureTier::Production => "production",
        }
    }
}

pub const COLD_START_FEATURE_COLS: [&str; 27] = [
    "day_of_week", "month", "quarter", "is_weekend", "is_holiday", "week_of_year", "day_of_month",
    "is_month_start", "is_month_end", "days_since_last_sale",
    "sales_7d", "sales_14d", "sales_30d", "sales_90d", "avg_daily_sales_7d", "avg_daily_sales_30d",
    "sales_trend_7d", "sales_trend_30d", "sales_volatility_7d", "sales_volatility_30d",
    "max_daily_sales_30d", "min_daily_sales_30d",
    "category_encoded",
    "is_promotion_active",
    "temperature", "precipitation", "oil_price",
];

/// The 19 production-only columns added on top of `COLD_START_FEATURE_COLS`.
pub const PRODUCTION_EXTRA_COLS: [&str; 19] = [
    "unit_cost", "unit_price", "margin_pct", "weight", "shelf_life_days", "is_seasonal", "is_perishable",
    "store_avg_daily_sales", "store_product_count", "store_inventory_turnover", "lat", "lon",
    "current_stock", "days_of_supply", "stock_velocity", "quantity_on_order", "stockout_count_30d",
    "promotion_discount_pct", "promotion_days_remaining",
];

/// Production-only signal columns used by `detect_feature_tier`: presence
/// and non-zero-ness of all five gates production detection, spec.md §4.D.
const PRODUCTION_SIGNAL_COLS: [&str; 5] =
    ["current_stock", "unit_cost", "unit_price", "store_inventory_turnover", "days_of_supply"];

/// Temporal features (10), derived purely from the target date.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalFeatures {
    pub day_of_week: i32,
    pub month: i32,
    pub quarter: i32,
    pub is_weekend: i32,
    pub is_holiday: i32,
    pub week_of_year: i32,
    pub day_of_month: i32,
    pub is_month_start: i32,
    pub is_month_end: i32,
    pub days_since_last_sale: f64,
}

pub fn temporal_features(date: NaiveDate, is_holiday: bool, days_since_last_sale: f64) -> TemporalFeatures {
    use chrono::Datelike;
    let dow = date.weekday().num_days_from_monday() as i32;
    TemporalFeatures {
        day_of_week: dow,
        month: date.month() as i32,
        quarter: (date.month0() / 3 + 1) as i32,
        is_weekend: i32::from(dow >= 5),
        is_holiday: i32::from(is_holiday),
        week_of_year: date.iso_week().week() as i32,
        day_of_month: date.day() as i32,
        is_month_start: i32::from(date.day() == 1),
        is_month_end: i32::from(date.month() != date.succ_opt().map(|d| d.month()).unwrap_or(date.month())),
        days_since_last_sale,
    }
}

/// A single day's observed sales quantity for one (store, product) pair.
/// The rolling-window builder requires the slice already be truncated to
/// `date <= as_of` — callers construct it from a causal query, never from
/// the full series (spec.md §4.D: "only data with date ≤ t contributes").
#[derive(Debug, Clone, Copy)]
pub struct CausalSalesObservation {
    pub date: NaiveDate,
    pub quantity: f64,
}

/// Sales-history rolling features (12), computed over a causal slice.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollingSalesFeatures {
    pub sales_7d: f64,
    pub sales_14d: f64,
    pub sales_30d: f64,
    pub sales_90d: f64,
    pub avg_daily_sales_7d: f64,
    pub avg_daily_sales_30d: f64,
    pub sales_trend_7d: f64,
    pub sales_trend_30d: f64,
    pub sales_volatility_7d: f64,
    pub sales_volatility_30d: f64,
    pub max_daily_sales_30d: f64,
    pub min_daily_sales_30d: f64,
}

/// A marker type whose existence proves the wrapped slice has already been
/// filtered to `date <= as_of`. `CausalSlice::new` is the only constructor,
/// and it performs the filter itself, so callers cannot smuggle in
/// future-dated rows by construction.
pub struct CausalSlice<'a> {
    rows: &'a [CausalSalesObservation],
    as_of: NaiveDate,
}

impl<'a> CausalSlice<'a> {
    /// Builds a causal slice from `history`, dropping anything dated after
    /// `as_of`. This is the single gate spec.md §4.D requires: "for a row at
    /// date t, only data with date ≤ t contributes".
    pub fn new(history: &'a [CausalSalesObservation], as_of: NaiveDate) -> Self {
        Self { rows: history, as_of }
    }

    fn filtered(&self) -> Vec<&CausalSalesObservation> {
        self.rows.iter().filter(|r| r.date <= self.as_of).collect()
    }
}

/// Builds the 12 rolling sales-history features from a causal slice using a
/// `polars` LazyFrame, grounded on `_sales_history_features`'s rolling-window
/// semantics (`min_periods=1` for sums/means/extrema, `min_periods=2` for
/// trend and volatility).
pub fn rolling_sales_features(slice: &CausalSlice<'_>) -> Result<RollingSalesFeatures> {
    let rows = slice.filtered();
    if rows.is_empty() {
        return Ok(RollingSalesFeatures::default());
    }

    let dates: Vec<i32> = rows.iter().map(|r| (r.date - slice.as_of).num_days() as i32).collect();
    let quantities: Vec<f64> = rows.iter().map(|r| r.quantity).collect();

    let df = DataFrame::new(vec![
        Series::new("offset_days".into(), dates).into(),
        Series::new("quantity".into(), quantities).into(),
    ])
    .map_err(|e| ForecastingError::Features(e.to_string()))?;

    let windowed_sum = |window: i64| -> Result<f64> {
        let filtered = df
            .clone()
            .lazy()
            .filter(col("offset_days").gt_eq(lit(-(window - 1))))
            .select([col("quantity").sum().alias("s")])
            .collect()
            .map_err(|e| ForecastingError::Features(e.to_string()))?;
        Ok(filtered.column("s").and_then(|c| c.f64()).ok().and_then(|a| a.get(0)).unwrap_or(0.0))
    };

    let windowed_mean = |window: i64| -> Result<f64> {
        let filtered = df
            .clone()
            .lazy()
            .filter(col("offset_days").gt_eq(lit(-(window - 1))))
            .select([col("quantity").mean().alias("m")])
            .collect()
            .map_err(|e| ForecastingError::Features(e.to_string()))?;
        Ok(filtered.column("m").and_then(|c| c.f64()).ok().and_then(|a| a.get(0)).unwrap_or(0.0))
    };

    let windowed_std = |window: i64| -> Result<f64> {
        let filtered = df
            .clone()
            .lazy()
            .filter(col("offset_days").gt_eq(lit(-(window - 1))))
            .select([col("quantity").std(1).alias("sd")])
            .collect()
            .map_err(|e| ForecastingError::Features(e.to_string()))?;
        Ok(filtered.column("sd").and_then(|c| c.f64()).ok().and_then(|a| a.get(0)).unwrap_or(0.0))
    };

    let windowed_extremum = |window: i64, max: bool| -> Result<f64> {
        let expr = if max { col("quantity").max() } else { col("quantity").min() };
        let filtered = df
            .clone()
            .lazy()
            .filter(col("offset_days").gt_eq(lit(-(window - 1))))
            .select([expr.alias("v")])
            .collect()
            .map_err(|e| ForecastingError::Features(e.to_string()))?;
        Ok(filtered.column("v").and_then(|c| c.f64()).ok().and_then(|a| a.get(0)).unwrap_or(0.0))
    };

    // Trend proxy: diff of the last two rolling means within the window
    // (mirrors `rolling(...).mean().diff()`). Needs >= 2 observations.
    let trend = |window: i64| -> Result<f64> {
        if rows.len() < 2 {
            return Ok(0.0);
        }
        let mean_now = windowed_mean(window)?;
        let prior_as_of = slice.as_of.pred_opt().unwrap_or(slice.as_of);
        let prior_slice = CausalSlice::new(slice.rows, prior_as_of);
        let prior_rows = prior_slice.filtered();
        if prior_rows.is_empty() {
            return Ok(0.0);
        }
        let prior_mean = {
            let sum: f64 = prior_rows
                .iter()
                .filter(|r| (r.date - prior_as_of).num_days() >= -(window - 1))
                .map(|r| r.quantity)
                .sum();
            let n = prior_rows
                .iter()
                .filter(|r| (r.date - prior_as_of).num_days() >= -(window - 1))
                .count();
            if n == 0 { 0.0 } else { sum / n as f64 }
        };
        Ok(mean_now - prior_mean)
    };

    Ok(RollingSalesFeatures {
        sales_7d: windowed_sum(7)?,
        sales_14d: windowed_sum(14)?,
        sales_30d: windowed_sum(30)?,
        sales_90d: windowed_sum(90)?,
        avg_daily_sales_7d: windowed_mean(7)?,
        avg_daily_sales_30d: windowed_mean(30)?,
        sales_trend_7d: trend(7)?,
        sales_trend_30d: trend(30)?,
        sales_volatility_7d: if rows.len() >= 2 { windowed_std(7)? } else { 0.0 },
        sales_volatility_30d: if rows.len() >= 2 { windowed_std(30)? } else { 0.0 },
        max_daily_sales_30d: windowed_extremum(30, true)?,
        min_daily_sales_30d: windowed_extremum(30, false)?,
    })
}

/// The 27-field cold-start row: buildable from any public dataset with
/// (date, store, product, quantity).
#[derive(Debug, Clone, Copy)]
pub struct ColdStartRow {
    pub day_of_week: i32,
    pub month: i32,
    pub quarter: i32,
    pub is_weekend: i32,
    pub is_holiday: i32,
    pub week_of_year: i32,
    pub day_of_month: i32,
    pub is_month_start: i32,
    pub is_month_end: i32,
    pub days_since_last_sale: f64,
    pub sales_7d: f64,
    pub sales_14d: f64,
    pub sales_30d: f64,
    pub sales_90d: f64,
    pub avg_daily_sales_7d: f64,
    pub avg_daily_sales_30d: f64,
    pub sales_trend_7d: f64,
    pub sales_trend_30d: f64,
    pub sales_volatility_7d: f64,
    pub sales_volatility_30d: f64,
    pub max_daily_sales_30d: f64,
    pub min_daily_sales_30d: f64,
    pub category_encoded: i32,
    pub is_promotion_active: i32,
    pub temperature: f64,
    pub precipitation: f64,
    pub oil_price: f64,
}

impl ColdStartRow {
    pub fn build(temporal: TemporalFeatures, rolling: RollingSalesFeatures, category_encoded: i32, is_promotion_active: bool, temperature: f64, precipitation: f64, oil_price: f64) -> Self {
        Self {
            day_of_week: temporal.day_of_week,
            month: temporal.month,
            quarter: temporal.quarter,
            is_weekend: temporal.is_weekend,
            is_holiday: temporal.is_holiday,
            week_of_year: temporal.week_of_year,
            day_of_month: temporal.day_of_month,
            is_month_start: temporal.is_month_start,
            is_month_end: temporal.is_month_end,
            days_since_last_sale: temporal.days_since_last_sale,
            sales_7d: rolling.sales_7d,
            sales_14d: rolling.sales_14d,
            sales_30d: rolling.sales_30d,
            sales_90d: rolling.sales_90d,
            avg_daily_sales_7d: rolling.avg_daily_sales_7d,
            avg_daily_sales_30d: rolling.avg_daily_sales_30d,
            sales_trend_7d: rolling.sales_trend_7d,
            sales_trend_30d: rolling.sales_trend_30d,
            sales_volatility_7d: rolling.sales_volatility_7d,
            sales_volatility_30d: rolling.sales_volatility_30d,
            max_daily_sales_30d: rolling.max_daily_sales_30d,
            min_daily_sales_30d: rolling.min_daily_sales_30d,
            category_encoded,
            is_promotion_active: i32::from(is_promotion_active),
            temperature,
            precipitation,
            oil_price,
        }
    }

    /// Column order matches `COLD_START_FEATURE_COLS` exactly.
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.day_of_week as f64, self.month as f64, self.quarter as f64, self.is_weekend as f64,
            self.is_holiday as f64, self.week_of_year as f64, self.day_of_month as f64,
            self.is_month_start as f64, self.is_month_end as f64, self.days_since_last_sale,
            self.sales_7d, self.sales_14d, self.sales_30d, self.sales_90d,
            self.avg_daily_sales_7d, self.avg_daily_sales_30d,
            self.sales_trend_7d, self.sales_trend_30d,
            self.sales_volatility_7d, self.sales_volatility_30d,
            self.max_daily_sales_30d, self.min_daily_sales_30d,
            self.category_encoded as f64, self.is_promotion_active as f64,
            self.temperature, self.precipitation, self.oil_price,
        ]
    }
}

/// The 19 columns production adds on top of `ColdStartRow`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionExtra {
    pub unit_cost: f64,
    pub unit_price: f64,
    pub margin_pct: f64,
    pub weight: f64,
    pub shelf_life_days: f64,
    pub is_seasonal: i32,
    pub is_perishable: i32,
    pub store_avg_daily_sales: f64,
    pub store_product_count: i32,
    pub store_inventory_turnover: f64,
    pub lat: f64,
    pub lon: f64,
    pub current_stock: f64,
    pub days_of_supply: f64,
    pub stock_velocity: f64,
    pub quantity_on_order: f64,
    pub stockout_count_30d: i32,
    pub promotion_discount_pct: f64,
    pub promotion_days_remaining: f64,
}

impl ProductionExtra {
    /// `margin_pct`, grounded on `_product_features`: 0 whenever
    /// `unit_price <= 0` rather than dividing by zero.
    pub fn margin_pct(unit_price: f64, unit_cost: f64) -> f64 {
        if unit_price > 0.0 { (unit_price - unit_cost) / unit_price } else { 0.0 }
    }

    /// `store_inventory_turnover`, grounded on `_store_features`: average
    /// inventory is floored at 1 so an empty store never divides by zero.
    pub fn inventory_turnover(avg_daily_sales: f64, avg_inventory: f64) -> f64 {
        avg_daily_sales / avg_inventory.max(1.0)
    }
}

/// The 46-field production row: `ColdStartRow` plus `ProductionExtra`.
#[derive(Debug, Clone, Copy)]
pub struct ProductionRow {
    pub cold_start: ColdStartRow,
    pub extra: ProductionExtra,
}

impl ProductionRow {
    /// Column order matches `PRODUCTION_FEATURE_COLS` (cold-start 27 then
    /// the 19 production-only columns) exactly.
    pub fn to_vec(&self) -> Vec<f64> {
        let mut v = self.cold_start.to_vec();
        v.extend_from_slice(&[
            self.extra.unit_cost, self.extra.unit_price, self.extra.margin_pct, self.extra.weight,
            self.extra.shelf_life_days, self.extra.is_seasonal as f64, self.extra.is_perishable as f64,
            self.extra.store_avg_daily_sales, self.extra.store_product_count as f64,
            self.extra.store_inventory_turnover, self.extra.lat, self.extra.lon,
            self.extra.current_stock, self.extra.days_of_supply, self.extra.stock_velocity,
            self.extra.quantity_on_order, self.extra.stockout_count_30d as f64,
            self.extra.promotion_discount_pct, self.extra.promotion_days_remaining,
        ]);
        v
    }

    /// Production-only signal presence, spec.md §4.D: tier is auto-detected
    /// by presence *and* non-zero-ness of {current_stock, unit_cost,
    /// unit_price, store_inventory_turnover, days_of_supply}.
    pub fn has_production_signal(&self) -> bool {
        self.extra.current_stock != 0.0
            && self.extra.unit_cost != 0.0
            && self.extra.unit_price != 0.0
            && self.extra.store_inventory_turnover != 0.0
            && self.extra.days_of_supply != 0.0
    }
}

/// Auto-detects the feature tier a `ProductionRow` actually supports,
/// grounded on `detect_feature_tier`. The caller may still force a tier
/// (spec.md §4.D); this only supplies the default.
pub fn detect_feature_tier(row: &ProductionRow) -> FeatureTier {
    if row.has_production_signal() { FeatureTier::Production } else { FeatureTier::ColdStart }
}

pub fn feature_cols(tier: FeatureTier) -> Vec<&'static str> {
    match tier {
        FeatureTier::ColdStart => COLD_START_FEATURE_COLS.to_vec(),
        FeatureTier::Production => {
            let mut v = COLD_START_FEATURE_COLS.to_vec();
            v.extend_from_slice(&PRODUCTION_EXTRA_COLS);
            v
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_column_count_is_27() {
        assert_eq!(COLD_START_FEATURE_COLS.len(), 27);
    }

    #[test]
    fn production_column_count_is_46() {
        assert_eq!(COLD_START_FEATURE_COLS.len() + PRODUCTION_EXTRA_COLS.len(), 46);
    }

    #[test]
    fn rolling_window_excludes_future_observations() {
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let history = vec![
            CausalSalesObservation { date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(), quantity: 5.0 },
            CausalSalesObservation { date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(), quantity: 3.0 },
            CausalSalesObservation { date: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(), quantity: 100.0 },
        ];
        let slice = CausalSlice::new(&history, as_of);
        let rolling = rolling_sales_features(&slice).unwrap();
        assert_eq!(rolling.sales_7d, 8.0);
    }

    #[test]
    fn production_tier_requires_every_signal_nonzero() {
        let temporal = temporal_features(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), false, 0.0);
        let cold = ColdStartRow::build(temporal, RollingSalesFeatures::default(), 0, false, 0.0, 0.0, 0.0);
        let mut extra = ProductionExtra::default();
        let row = ProductionRow { cold_start: cold, extra };
        assert_eq!(detect_feature_tier(&row), FeatureTier::ColdStart);

        extra.current_stock = 10.0;
        extra.unit_cost = 2.0;
        extra.unit_price = 5.0;
        extra.store_inventory_turnover = 1.5;
        extra.days_of_supply = 4.0;
        let row = ProductionRow { cold_start: row.cold_start, extra };
        assert_eq!(detect_feature_tier(&row), FeatureTier::Production);
    }

    #[test]
    fn margin_pct_guards_zero_price() {
        assert_eq!(ProductionExtra::margin_pct(0.0, 3.0), 0.0);
        assert!((ProductionExtra::margin_pct(10.0, 6.0) - 0.4).abs() < 1e-9);
    }
}
