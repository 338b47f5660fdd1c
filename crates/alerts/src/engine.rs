//! Alert detection and the `detect -> deduplicate -> persist -> publish`
//! pipeline, spec.md §4.I. Grounded in
//! `examples/original_source/backend/alerts/engine.py` (stockout/reorder
//! detection, severity thresholds, dedup, pipeline ordering),
//! `backend/ml/anomaly.py` (anomaly feature vector) and
//! `backend/ml/ghost_stock.py` (ghost-stock ratio rule).

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use shelfops_core::TenantContext;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{alert_type_str, Alert, AlertType, Anomaly, Severity};

const STOCKOUT_DAYS_CRITICAL: f64 = 1.0;
const STOCKOUT_DAYS_HIGH: f64 = 3.0;
const STOCKOUT_DAYS_MEDIUM: f64 = 5.0;

const ANOMALY_Z_CRITICAL: f64 = 4.0;
const ANOMALY_Z_HIGH: f64 = 3.0;
const ANOMALY_Z_MEDIUM: f64 = 2.5;
const ANOMALY_Z_LOW: f64 = 2.0;

/// Classifies stockout severity from days-of-supply, spec.md §4.I.
pub fn classify_severity(days_of_supply: f64) -> Severity {
    if days_of_supply <= STOCKOUT_DAYS_CRITICAL {
        Severity::Critical
    } else if days_of_supply <= STOCKOUT_DAYS_HIGH {
        Severity::High
    } else if days_of_supply <= STOCKOUT_DAYS_MEDIUM {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Classifies anomaly severity from `|z_score|`, spec.md §4.I. Returns
/// `None` below the `low` threshold — unlike the stockout classifier there
/// is no "not anomalous" floor in the original, but keeping a floor here
/// stops every slightly-off row from producing a permanent low-severity
/// alert.
pub fn classify_anomaly_severity(z_score: f64) -> Option<Severity> {
    let z = z_score.abs();
    if z >= ANOMALY_Z_CRITICAL {
        Some(Severity::Critical)
    } else if z >= ANOMALY_Z_HIGH {
        Some(Severity::High)
    } else if z >= ANOMALY_Z_MEDIUM {
        Some(Severity::Medium)
    } else if z >= ANOMALY_Z_LOW {
        Some(Severity::Low)
    } else {
        None
    }
}

/// A detector's output before dedup/persistence: enough to build an
/// `Alert` row but not yet assigned an id.
#[derive(Debug, Clone)]
pub struct AlertCandidate {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub metadata: Map<String, Value>,
}

impl AlertCandidate {
    pub fn into_alert(self, tenant_id: Uuid) -> Alert {
        Alert::new(tenant_id, self.store_id, self.product_id, self.alert_type, self.severity, self.message, self.metadata)
    }

    fn dedup_key(&self) -> (Uuid, Uuid, &'static str) {
        (self.store_id, self.product_id, alert_type_str(self.alert_type))
    }
}

/// One (store, product)'s latest inventory snapshot and 7-day forecast
/// demand, already shrinkage-adjusted by the caller.
#[derive(Debug, Clone, Copy)]
pub struct StockoutCandidateInput {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub available: f64,
    pub raw_available: f64,
    pub shrink_rate: f64,
    pub forecast_demand_7d: f64,
}

/// Aggregate 7-day forecast demand vs shrinkage-adjusted available
/// inventory, spec.md §4.I first bullet.
pub fn detect_stockouts(inputs: &[StockoutCandidateInput]) -> Vec<AlertCandidate> {
    inputs
        .iter()
        .filter(|i| i.available < i.forecast_demand_7d)
        .map(|i| {
            let days_of_supply = i.available / (i.forecast_demand_7d / 7.0).max(0.01);
            let severity = classify_severity(days_of_supply);
            let mut metadata = Map::new();
            metadata.insert("current_stock".into(), json!(i.available));
            metadata.insert("raw_stock".into(), json!(i.raw_available));
            metadata.insert("shrinkage_adjusted".into(), json!(i.available != i.raw_available));
            metadata.insert("shrink_rate_pct".into(), json!((i.shrink_rate * 100.0 * 100.0).round() / 100.0));
            metadata.insert("forecast_demand_7d".into(), json!((i.forecast_demand_7d * 10.0).round() / 10.0));
            metadata.insert("days_of_supply".into(), json!((days_of_supply * 10.0).round() / 10.0));
            AlertCandidate {
                store_id: i.store_id,
                product_id: i.product_id,
                alert_type: AlertType::StockoutPredicted,
                severity,
                message: format!(
                    "Stockout predicted in {:.0} days. Current stock: {:.0}, 7-day forecast demand: {:.0}",
                    days_of_supply, i.available, i.forecast_demand_7d
                ),
                metadata,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct ReorderCandidateInput {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub available: i64,
    pub reorder_point: i64,
    pub safety_stock: i64,
    pub suggested_qty: i64,
    pub active_in_store: bool,
}

/// Compares available inventory against `ReorderPoint`, spec.md §4.I
/// second bullet. Products delisted/seasonal-out of a store's planogram
/// are skipped by `active_in_store`, computed by the caller.
pub fn detect_reorder_needed(inputs: &[ReorderCandidateInput]) -> Vec<AlertCandidate> {
    inputs
        .iter()
        .filter(|i| i.active_in_store && i.available <= i.reorder_point)
        .map(|i| {
            let severity = if i.available > i.safety_stock { Severity::Medium } else { Severity::High };
            let mut metadata = Map::new();
            metadata.insert("current_stock".into(), json!(i.available));
            metadata.insert("reorder_point".into(), json!(i.reorder_point));
            metadata.insert("safety_stock".into(), json!(i.safety_stock));
            metadata.insert("suggested_qty".into(), json!(i.suggested_qty));
            AlertCandidate {
                store_id: i.store_id,
                product_id: i.product_id,
                alert_type: AlertType::ReorderRecommended,
                severity,
                message: format!(
                    "Reorder recommended. Stock: {}, reorder point: {}. Suggested order qty: {}",
                    i.available, i.reorder_point, i.suggested_qty
                ),
                metadata,
            }
        })
        .collect()
}

/// The 8-feature vector named in spec.md §4.I for anomaly detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnomalyFeatures {
    pub sales_7d: f64,
    pub trend_7d: f64,
    pub on_hand: f64,
    pub price: f64,
    pub day_of_week: f64,
    pub holiday: f64,
    pub turnover: f64,
    pub price_vs_category_avg: f64,
}

impl AnomalyFeatures {
    fn as_array(&self) -> [f64; 8] {
        [self.sales_7d, self.trend_7d, self.on_hand, self.price, self.day_of_week, self.holiday, self.turnover, self.price_vs_category_avg]
    }
}

/// Population mean/std per feature, computed by the caller over the
/// tenant's recent history window. Stands in for the Isolation Forest's
/// learned decision boundary with a closed-form composite z-score: the
/// root-mean-square of each feature's z-score, so an outlier on any single
/// axis still surfaces even when the others are unremarkable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeaturePopulationStats {
    pub mean: [f64; 8],
    pub std: [f64; 8],
}

pub fn composite_z_score(features: &AnomalyFeatures, stats: &FeaturePopulationStats) -> f64 {
    let values = features.as_array();
    let sum_sq: f64 = (0..8)
        .map(|i| {
            let z = (values[i] - stats.mean[i]) / stats.std[i].max(1e-8);
            z * z
        })
        .sum();
    (sum_sq / 8.0).sqrt()
}

#[derive(Debug, Clone, Copy)]
pub struct AnomalyCandidateInput {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub features: AnomalyFeatures,
}

/// Flags (store, product) rows whose composite z-score clears the `low`
/// threshold, spec.md §4.I third bullet.
pub fn detect_anomalies(inputs: &[AnomalyCandidateInput], stats: &FeaturePopulationStats) -> Vec<AlertCandidate> {
    inputs
        .iter()
        .filter_map(|i| {
            let z = composite_z_score(&i.features, stats);
            let severity = classify_anomaly_severity(z)?;
            let mut metadata = Map::new();
            metadata.insert("z_score".into(), json!(z));
            metadata.insert("sales_7d".into(), json!(i.features.sales_7d));
            metadata.insert("trend_7d".into(), json!(i.features.trend_7d));
            metadata.insert("quantity_on_hand".into(), json!(i.features.on_hand));
            metadata.insert("unit_price".into(), json!(i.features.price));
            Some(AlertCandidate {
                store_id: i.store_id,
                product_id: i.product_id,
                alert_type: AlertType::AnomalyDetected,
                severity,
                message: format!("Anomalous activity detected (z-score {:.2})", z),
                metadata,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct GhostStockInput {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub quantity_on_hand: f64,
    pub unit_price: f64,
    /// `(actual_sales, forecasted_demand)` pairs for the lookback window,
    /// one per day.
    pub daily_actual_vs_forecast: Vec<(f64, f64)>,
}

/// Phantom-inventory detection, spec.md §4.I fourth bullet: emits an
/// `inventory_discrepancy` `Anomaly` (not an operational `Alert`) when
/// `actual/forecast < ratio_threshold` on at least `min_days` of the
/// lookback window and `quantity_on_hand > 0`.
pub fn detect_ghost_stock(tenant_id: Uuid, inputs: &[GhostStockInput], ratio_threshold: f64, min_days: usize) -> Vec<Anomaly> {
    inputs
        .iter()
        .filter(|i| i.quantity_on_hand > 0.0)
        .filter_map(|i| {
            let lookback = i.daily_actual_vs_forecast.len().max(1);
            let low_days = i
                .daily_actual_vs_forecast
                .iter()
                .filter(|(actual, forecast)| *forecast > 0.0 && (actual / forecast) < ratio_threshold)
                .count();
            if low_days < min_days {
                return None;
            }
            let ghost_value = i.quantity_on_hand * i.unit_price;
            let ghost_probability = (low_days as f64 / lookback as f64).min(0.95);
            Some(Anomaly {
                id: Uuid::new_v4(),
                tenant_id,
                store_id: i.store_id,
                product_id: i.product_id,
                anomaly_type: "inventory_discrepancy".to_string(),
                severity: if ghost_probability >= 0.7 { "high".to_string() } else { "medium".to_string() },
                description: format!("Possible ghost stock: {} of {} days well under forecast", low_days, lookback),
                metadata: json!({
                    "quantity_on_hand": i.quantity_on_hand,
                    "ghost_value": ghost_value,
                    "ghost_probability": ghost_probability,
                    "low_sales_days": low_days,
                }),
                detected_at: chrono::Utc::now(),
            })
        })
        .collect()
}

/// Drops a candidate if an alert with the same (store, product, alert_type)
/// already exists in status `open`/`acknowledged`. Pure, so it is
/// unit-testable without a database, spec.md §4.I.
pub fn deduplicate_alerts(candidates: Vec<AlertCandidate>, existing_open: &HashSet<(Uuid, Uuid, &'static str)>) -> Vec<AlertCandidate> {
    candidates.into_iter().filter(|c| !existing_open.contains(&c.dedup_key())).collect()
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn open_alert_keys(&self, tenant: &TenantContext) -> shelfops_core::error::Result<HashSet<(Uuid, Uuid, String)>>;
    async fn insert_alerts(&self, tenant: &TenantContext, alerts: Vec<Alert>) -> shelfops_core::error::Result<Vec<Alert>>;
}

#[async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish(&self, tenant: &TenantContext, alerts: &[Alert]) -> shelfops_core::error::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineSummary {
    pub detected: usize,
    pub deduplicated: usize,
    pub persisted: usize,
    pub published: bool,
}

/// `detect -> deduplicate -> persist -> publish`, spec.md §4.I and §5:
/// persistence and publication are not atomic, so a publish failure is
/// logged and reflected in the summary rather than rolling back the
/// alerts that were already written.
pub async fn run_alert_pipeline<R: AlertRepository, P: AlertPublisher>(
    tenant: &TenantContext,
    candidates: Vec<AlertCandidate>,
    repo: &R,
    publisher: &P,
) -> Result<PipelineSummary> {
    let detected = candidates.len();

    let existing_rows = repo.open_alert_keys(tenant).await?;
    let existing: HashSet<(Uuid, Uuid, &'static str)> = existing_rows.iter().map(|(s, p, t)| (*s, *p, leak_alert_type(t))).collect();
    let deduped = deduplicate_alerts(candidates, &existing);
    let deduplicated = deduped.len();

    let alerts: Vec<Alert> = deduped.into_iter().map(|c| c.into_alert(tenant.tenant_id.0)).collect();
    let persisted = repo.insert_alerts(tenant, alerts).await?;
    let persisted_count = persisted.len();

    let published = match publisher.publish(tenant, &persisted).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(tenant = %tenant.tenant_id, error = %err, "alert publish failed; persisted alerts remain valid");
            false
        }
    };

    Ok(PipelineSummary { detected, deduplicated, persisted: persisted_count, published })
}

/// Interns an owned alert-type string back to `&'static str` for the
/// dedup set's key shape. Bounded by the fixed `AlertType` vocabulary, so
/// this never grows unboundedly.
fn leak_alert_type(s: &str) -> &'static str {
    for variant in [
        AlertType::StockoutPredicted,
        AlertType::ReorderRecommended,
        AlertType::AnomalyDetected,
        AlertType::ForecastAccuracyLow,
        AlertType::ModelDriftDetected,
        AlertType::DataStale,
        AlertType::ReceivingDiscrepancy,
        AlertType::VendorReliabilityLow,
        AlertType::ReorderPointChanged,
    ] {
        let name = alert_type_str(variant);
        if name == s {
            return name;
        }
    }
    "unknown"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stockout_severity_matches_days_of_supply_bands() {
        assert_eq!(classify_severity(0.5), Severity::Critical);
        assert_eq!(classify_severity(2.0), Severity::High);
        assert_eq!(classify_severity(4.0), Severity::Medium);
        assert_eq!(classify_severity(10.0), Severity::Low);
    }

    #[test]
    fn anomaly_severity_has_a_floor() {
        assert_eq!(classify_anomaly_severity(5.0), Some(Severity::Critical));
        assert_eq!(classify_anomaly_severity(3.5), Some(Severity::High));
        assert_eq!(classify_anomaly_severity(2.6), Some(Severity::Medium));
        assert_eq!(classify_anomaly_severity(2.1), Some(Severity::Low));
        assert_eq!(classify_anomaly_severity(1.0), None);
    }

    #[test]
    fn detect_stockouts_only_fires_when_demand_exceeds_available() {
        let store = Uuid::new_v4();
        let product = Uuid::new_v4();
        let inputs = vec![StockoutCandidateInput {
            store_id: store,
            product_id: product,
            available: 10.0,
            raw_available: 12.0,
            shrink_rate: 0.02,
            forecast_demand_7d: 70.0,
        }];
        let candidates = detect_stockouts(&inputs);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].severity, Severity::Critical);
    }

    #[test]
    fn detect_reorder_needed_skips_inactive_products() {
        let inputs = vec![ReorderCandidateInput {
            store_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            available: 3,
            reorder_point: 10,
            safety_stock: 5,
            suggested_qty: 40,
            active_in_store: false,
        }];
        assert!(detect_reorder_needed(&inputs).is_empty());
    }

    #[test]
    fn detect_reorder_needed_severity_depends_on_safety_stock() {
        let store = Uuid::new_v4();
        let product = Uuid::new_v4();
        let inputs = vec![ReorderCandidateInput {
            store_id: store,
            product_id: product,
            available: 2,
            reorder_point: 10,
            safety_stock: 5,
            suggested_qty: 40,
            active_in_store: true,
        }];
        let candidates = detect_reorder_needed(&inputs);
        assert_eq!(candidates[0].severity, Severity::High);
    }

    #[test]
    fn ghost_stock_requires_minimum_low_sales_days() {
        let store = Uuid::new_v4();
        let product = Uuid::new_v4();
        let daily = vec![(1.0, 10.0), (1.0, 10.0), (8.0, 10.0), (1.0, 10.0), (9.0, 10.0), (9.0, 10.0), (9.0, 10.0)];
        let inputs = vec![GhostStockInput { store_id: store, product_id: product, quantity_on_hand: 50.0, unit_price: 4.0, daily_actual_vs_forecast: daily }];
        let anomalies = detect_ghost_stock(Uuid::new_v4(), &inputs, 0.3, 3);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].anomaly_type, "inventory_discrepancy");
    }

    #[test]
    fn ghost_stock_ignores_empty_shelves() {
        let inputs = vec![GhostStockInput {
            store_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity_on_hand: 0.0,
            unit_price: 4.0,
            daily_actual_vs_forecast: vec![(0.0, 10.0); 7],
        }];
        assert!(detect_ghost_stock(Uuid::new_v4(), &inputs, 0.3, 3).is_empty());
    }

    #[test]
    fn dedup_drops_candidates_matching_open_alerts() {
        let store = Uuid::new_v4();
        let product = Uuid::new_v4();
        let candidates = vec![AlertCandidate {
            store_id: store,
            product_id: product,
            alert_type: AlertType::ReorderRecommended,
            severity: Severity::Medium,
            message: "test".into(),
            metadata: Map::new(),
        }];
        let mut existing = HashSet::new();
        existing.insert((store, product, "reorder_recommended"));
        assert!(deduplicate_alerts(candidates, &existing).is_empty());
    }
}
