//! Forecast runtime, spec.md §4.G. Grounded on
//! `examples/original_source/backend/ml/predict.py` (business-rule
//! adjustments) and `backend/workers/forecast.py` (version resolution,
//! delete-then-insert persistence).

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use shelfops_core::TenantContext;
use uuid::Uuid;

use crate::arena::{ModelVersion, Registry};
use crate::error::{ForecastingError, Result};
use crate::features::{temporal_features, ProductionRow, TemporalFeatures};
use crate::train::{ModelArtifact, PredictionOutput};

#[derive(Debug, Clone, Copy)]
pub struct DemandForecast {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub forecast_date: NaiveDate,
    pub forecasted_demand: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub confidence: Option<f64>,
}

/// Persists a day's forecasts, spec.md §4.G step 4: existing rows for
/// (tenant, model_version, date) are deleted before the new rows are
/// inserted, folded into one method so callers cannot observe a partial
/// state — "delete-then-insert ... atomically per (date × tenant ×
/// version)" (spec.md §5).
#[async_trait]
pub trait ForecastRepository: Send + Sync {
    async fn replace_forecasts_for_day(&self, tenant: &TenantContext, model_version: &str, forecast_date: NaiveDate, rows: Vec<DemandForecast>) -> shelfops_core::error::Result<()>;
}

/// Resolves the active model version, spec.md §4.G step 1: "explicit
/// override > champion > last-known champion pointer".
pub fn resolve_active_version<'a>(registry: &'a Registry, tenant_id: Uuid, model_name: &str, explicit_override: Option<&'a str>, last_known_champion: Option<&'a str>) -> Result<&'a str> {
    if let Some(version) = explicit_override {
        return Ok(version);
    }
    if let Some(champion) = registry.champion(tenant_id, model_name) {
        return Ok(&champion.version);
    }
    last_known_champion.ok_or_else(|| ForecastingError::NoActiveVersion { model_name: model_name.to_string() })
}

/// One (store, product) pair's most recent causal feature row, used as the
/// starting point for every forecast day: temporal columns are overridden
/// per target day, but the rolling-sales/product/store/inventory columns
/// carry forward unchanged (no future observed values leak in).
#[derive(Debug, Clone)]
pub struct LatestFeatureRow {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub row: ProductionRow,
    pub is_new_item: bool,
    pub category: Option<String>,
    pub is_seasonal: bool,
    pub is_perishable: bool,
    pub shelf_life_days: Option<f64>,
    pub active_promotion_lift: Option<f64>,
}

/// Overrides a feature row's temporal columns for `target_date` without
/// touching anything else, spec.md §4.G step 3 ("without leaking future
/// observed values"). Grounded on `_apply_future_temporal_columns`.
pub fn with_future_temporal_columns(mut row: ProductionRow, target_date: NaiveDate, day_offset: i64) -> ProductionRow {
    let t: TemporalFeatures = temporal_features(target_date, false, row.cold_start.days_since_last_sale + day_offset as f64);
    row.cold_start.day_of_week = t.day_of_week;
    row.cold_start.month = t.month;
    row.cold_start.quarter = t.quarter;
    row.cold_start.is_weekend = t.is_weekend;
    row.cold_start.week_of_year = t.week_of_year;
    row.cold_start.day_of_month = t.day_of_month;
    row.cold_start.is_month_start = t.is_month_start;
    row.cold_start.is_month_end = t.is_month_end;
    row.cold_start.days_since_last_sale = t.days_since_last_sale;
    row
}

/// Business-rule adjustments applied on top of raw model output, spec.md
/// §9 generalization of `apply_business_rules`: new items fall back to a
/// lower-confidence estimate, active promotions apply their lift, seasonal
/// items get a peak-month bump, and perishables are capped by shelf life.
pub fn apply_business_rules(mut forecast: DemandForecast, feature: &LatestFeatureRow, category_average: Option<f64>) -> DemandForecast {
    const PEAK_MONTHS: [u32; 4] = [11, 12, 6, 7];
    use chrono::Datelike;

    if feature.is_new_item {
        if let Some(avg) = category_average {
            forecast.forecasted_demand = avg;
        }
        forecast.confidence = Some(0.5);
    }

    if let Some(lift) = feature.active_promotion_lift {
        forecast.forecasted_demand *= lift;
        if let Some(upper) = forecast.upper_bound.as_mut() {
            *upper *= lift;
        }
    }

    if feature.is_seasonal && PEAK_MONTHS.contains(&forecast.forecast_date.month()) {
        forecast.forecasted_demand *= 1.2;
        if let Some(upper) = forecast.upper_bound.as_mut() {
            *upper *= 1.2;
        }
    }

    if feature.is_perishable {
        if let Some(shelf_life) = feature.shelf_life_days {
            let cap = shelf_life * 0.8;
            forecast.forecasted_demand = forecast.forecasted_demand.min(cap);
        }
    }

    forecast
}

/// Generates forecasts for `[today+1, today+horizon_days]`, spec.md §4.G.
/// `model` predicts from one feature vector per day, built by overriding
/// the latest causal row's temporal columns; every prediction clips to
/// `>= 0` and is handed to `apply_business_rules` before being returned
/// for persistence via `ForecastRepository::replace_forecasts_for_day`.
pub fn generate_forecasts_for_pair(model: &ModelArtifact, feature: &LatestFeatureRow, today: NaiveDate, horizon_days: i64, confidence_level: f64, category_average: Option<f64>) -> Result<Vec<DemandForecast>> {
    let mut results = Vec::with_capacity(horizon_days as usize);
    for day_offset in 1..=horizon_days {
        let target_date = today + Duration::days(day_offset);
        let projected = with_future_temporal_columns(feature.row, target_date, day_offset);
        let output = model.regressor.predict(&[projected.to_vec()])?;

        let (lower, mid, upper) = match &output {
            PredictionOutput::Quantiles(q) => (q[0][0], q[0][1], q[0][2]),
            PredictionOutput::Point(p) => (p[0], p[0], p[0]),
        };

        let forecast = DemandForecast {
            store_id: feature.store_id,
            product_id: feature.product_id,
            forecast_date: target_date,
            forecasted_demand: mid.max(0.0),
            lower_bound: Some(lower.max(0.0)),
            upper_bound: Some(upper.max(0.0)),
            confidence: Some(confidence_level),
        };
        results.push(apply_business_rules(forecast, feature, category_average));
    }
    Ok(results)
}

/// Groups a day's generated forecasts across all (store, product) pairs
/// and replaces exactly that day's rows for `model_version`, matching
/// spec.md §4.G step 4 and §5's atomicity guarantee.
pub async fn persist_day<R: ForecastRepository>(repo: &R, tenant: &TenantContext, model_version: &str, forecast_date: NaiveDate, rows: Vec<DemandForecast>) -> shelfops_core::error::Result<()> {
    repo.replace_forecasts_for_day(tenant, model_version, forecast_date, rows).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ModelMetrics;
    use crate::features::{ColdStartRow, ProductionExtra, RollingSalesFeatures};
    use crate::train::{ExponentialSmoothingRegressor, Regressor};

    fn sample_feature_row() -> LatestFeatureRow {
        let temporal = temporal_features(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), false, 2.0);
        let cold = ColdStartRow::build(temporal, RollingSalesFeatures::default(), 3, false, 60.0, 0.0, 70.0);
        LatestFeatureRow {
            store_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            row: ProductionRow { cold_start: cold, extra: ProductionExtra::default() },
            is_new_item: false,
            category: Some("beverages".to_string()),
            is_seasonal: false,
            is_perishable: false,
            shelf_life_days: None,
            active_promotion_lift: None,
        }
    }

    #[test]
    fn resolve_active_version_prefers_explicit_override() {
        let registry = Registry::new();
        let result = resolve_active_version(&registry, Uuid::new_v4(), "demand_forecast", Some("v7"), Some("v3")).unwrap();
        assert_eq!(result, "v7");
    }

    #[test]
    fn resolve_active_version_falls_back_to_last_known_champion() {
        let registry = Registry::new();
        let result = resolve_active_version(&registry, Uuid::new_v4(), "demand_forecast", None, Some("v3")).unwrap();
        assert_eq!(result, "v3");
    }

    #[test]
    fn resolve_active_version_errors_with_nothing_available() {
        let registry = Registry::new();
        let result = resolve_active_version(&registry, Uuid::new_v4(), "demand_forecast", None, None);
        assert!(result.is_err());
    }

    #[test]
    fn perishable_forecast_is_capped_at_80pct_shelf_life() {
        let mut feature = sample_feature_row();
        feature.is_perishable = true;
        feature.shelf_life_days = Some(10.0);
        let forecast = DemandForecast {
            store_id: feature.store_id,
            product_id: feature.product_id,
            forecast_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            forecasted_demand: 50.0,
            lower_bound: Some(40.0),
            upper_bound: Some(60.0),
            confidence: Some(0.9),
        };
        let adjusted = apply_business_rules(forecast, &feature, None);
        assert_eq!(adjusted.forecasted_demand, 8.0);
    }

    #[test]
    fn generated_forecasts_never_negative_and_cover_full_horizon() {
        let feature = sample_feature_row();
        let mut regressor = ExponentialSmoothingRegressor::default();
        regressor.fit(&[vec![], vec![], vec![]], &[5.0, 6.0, 4.0]).unwrap();
        let artifact = ModelArtifact {
            regressor: Box::new(regressor),
            metadata: crate::train::ArtifactMetadata {
                version: "v1".to_string(),
                tier: crate::train::FeatureTier_::Production,
                feature_cols: vec![],
                weights: Default::default(),
                training_rows: 3,
                metrics: ModelMetrics::default(),
            },
        };
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let forecasts = generate_forecasts_for_pair(&artifact, &feature, today, 5, 0.9, None).unwrap();
        assert_eq!(forecasts.len(), 5);
        assert!(forecasts.iter().all(|f| f.forecasted_demand >= 0.0));
    }
}
