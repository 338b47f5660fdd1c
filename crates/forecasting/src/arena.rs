//! Model arena & registry, spec.md §4.E. Grounded on
//! `examples/original_source/backend/ml/arena.py`.
//!
//! `Registry::promote` is the only mutator of `ModelVersion::status`; it
//! enforces "at most one champion per (tenant, model_name)" by archiving
//! the prior champion in the same call, independent of the storage layer,
//! so the invariant is unit-testable without a database. The repository
//! wraps the same sequence in one SQL transaction in a real deployment.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Candidate,
    Challenger,
    Shadow,
    Champion,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    Champion,
    Shadow,
    Canary,
    StoreSegment,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mae: f64,
    pub mape: f64,
    pub coverage: f64,
}

#[derive(Debug, Clone)]
pub struct ModelVersion {
    pub model_id: Uuid,
    pub tenant_id: Uuid,
    pub model_name: String,
    pub version: String,
    pub status: ModelStatus,
    pub metrics: ModelMetrics,
    pub routing_weight: f64,
    pub smoke_test_passed: bool,
    pub feature_tier: String,
    pub feature_cols: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub promoted_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl ModelVersion {
    pub fn new_candidate(tenant_id: Uuid, model_name: impl Into<String>, version: impl Into<String>, metrics: ModelMetrics, feature_tier: impl Into<String>, feature_cols: Vec<String>) -> Self {
        Self {
            model_id: Uuid::new_v4(),
            tenant_id,
            model_name: model_name.into(),
            version: version.into(),
            status: ModelStatus::Candidate,
            metrics,
            routing_weight: 0.0,
            smoke_test_passed: false,
            feature_tier: feature_tier.into(),
            feature_cols,
            created_at: Utc::now(),
            promoted_at: None,
            archived_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionOutcome {
    pub promoted: bool,
    pub reason: String,
    pub champion_mae: Option<f64>,
    pub candidate_mae: f64,
}

/// Default improvement threshold, spec.md §4.E: "5% improvement" = 0.95.
pub const DEFAULT_IMPROVEMENT_THRESHOLD: f64 = 0.95;

/// In-memory model registry. Keyed by `(tenant_id, model_name)`; within a
/// key, enforces at most one champion. A real deployment's repository
/// mirrors every `promote` call into `model_versions` inside one
/// transaction; this type is the authority on the state machine itself.
#[derive(Debug, Default)]
pub struct Registry {
    versions: HashMap<(Uuid, String), Vec<ModelVersion>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tenant_id: Uuid, model_name: &str) -> (Uuid, String) {
        (tenant_id, model_name.to_string())
    }

    pub fn register(&mut self, version: ModelVersion) {
        self.versions.entry(Self::key(version.tenant_id, &version.model_name)).or_default().push(version);
    }

    pub fn champion(&self, tenant_id: Uuid, model_name: &str) -> Option<&ModelVersion> {
        self.versions
            .get(&Self::key(tenant_id, model_name))?
            .iter()
            .filter(|v| v.status == ModelStatus::Champion)
            .max_by_key(|v| v.promoted_at)
    }

    pub fn challenger(&self, tenant_id: Uuid, model_name: &str) -> Option<&ModelVersion> {
        self.versions
            .get(&Self::key(tenant_id, model_name))?
            .iter()
            .filter(|v| v.status == ModelStatus::Challenger)
            .max_by_key(|v| v.created_at)
    }

    /// Promotes `version` to champion, archiving the current champion (if
    /// any) in the same call. This is the sole path that sets
    /// `ModelStatus::Champion`, so "at most one champion" holds by
    /// construction.
    pub fn promote(&mut self, tenant_id: Uuid, model_name: &str, version: &str) -> Result<(), String> {
        let now = Utc::now();
        let bucket = self
            .versions
            .get_mut(&Self::key(tenant_id, model_name))
            .ok_or_else(|| format!("no versions registered for model {model_name}"))?;

        for v in bucket.iter_mut() {
            if v.status == ModelStatus::Champion {
                v.status = ModelStatus::Archived;
                v.archived_at = Some(now);
            }
        }

        let target = bucket
            .iter_mut()
            .find(|v| v.version == version)
            .ok_or_else(|| format!("version {version} not found for model {model_name}"))?;
        target.status = ModelStatus::Champion;
        target.promoted_at = Some(now);
        target.routing_weight = 1.0;
        Ok(())
    }

    fn set_challenger(&mut self, tenant_id: Uuid, model_name: &str, version: &str) -> Result<(), String> {
        let bucket = self
            .versions
            .get_mut(&Self::key(tenant_id, model_name))
            .ok_or_else(|| format!("no versions registered for model {model_name}"))?;
        let target = bucket
            .iter_mut()
            .find(|v| v.version == version)
            .ok_or_else(|| format!("version {version} not found for model {model_name}"))?;
        target.status = ModelStatus::Challenger;
        target.routing_weight = 0.0;
        Ok(())
    }

    /// Compares `candidate` against the current champion and promotes or
    /// demotes to challenger, spec.md §4.E. First candidate for a
    /// (tenant, model_name) is auto-promoted.
    pub fn evaluate_for_promotion(
        &mut self,
        tenant_id: Uuid,
        model_name: &str,
        candidate_version: &str,
        candidate_metrics: ModelMetrics,
        improvement_threshold: f64,
    ) -> Result<PromotionOutcome, String> {
        let Some(champion) = self.champion(tenant_id, model_name).cloned() else {
            self.promote(tenant_id, model_name, candidate_version)?;
            return Ok(PromotionOutcome {
                promoted: true,
                reason: "first_champion".to_string(),
                champion_mae: None,
                candidate_mae: candidate_metrics.mae,
            });
        };

        let mae_improved = candidate_metrics.mae < champion.metrics.mae * improvement_threshold;
        let mape_improved = candidate_metrics.mape < champion.metrics.mape * improvement_threshold;
        let coverage_ok = candidate_metrics.coverage >= champion.metrics.coverage;

        if mae_improved && mape_improved && coverage_ok {
            self.promote(tenant_id, model_name, candidate_version)?;
            Ok(PromotionOutcome {
                promoted: true,
                reason: "better_performance".to_string(),
                champion_mae: Some(champion.metrics.mae),
                candidate_mae: candidate_metrics.mae,
            })
        } else {
            self.set_challenger(tenant_id, model_name, candidate_version)?;
            Ok(PromotionOutcome {
                promoted: false,
                reason: "insufficient_improvement".to_string(),
                champion_mae: Some(champion.metrics.mae),
                candidate_mae: candidate_metrics.mae,
            })
        }
    }
}

/// Selects which model version serves a request, spec.md §4.E. `canary`
/// routes deterministically via a stable hash of (tenant, model_name,
/// routing_key) modulo 100 — not Rust's unstable default hasher, so the
/// same inputs always route the same way across processes.
pub fn select_model_for_request(tenant_id: Uuid, model_name: &str, routing_key: &str, strategy: RoutingStrategy, challenger_weight: f64) -> &'static str {
    match strategy {
        RoutingStrategy::Champion | RoutingStrategy::Shadow | RoutingStrategy::StoreSegment => "champion",
        RoutingStrategy::Canary => {
            if challenger_weight <= 0.0 {
                return "champion";
            }
            let bucket = stable_hash(&format!("{tenant_id}{model_name}{routing_key}")) % 100;
            if bucket < (challenger_weight * 100.0) as u64 { "challenger" } else { "champion" }
        }
    }
}

/// FNV-1a: stable across processes and Rust versions, unlike
/// `std::collections::hash_map::DefaultHasher`.
fn stable_hash(input: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    FnvLike(input).hash(&mut hasher);
    hasher.finish()
}

struct FnvLike<'a>(&'a str);

impl Hash for FnvLike<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut h: u64 = 0xcbf29ce484222325;
        for byte in self.0.as_bytes() {
            h ^= *byte as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        state.write_u64(h);
    }
}

/// A parallel champion/challenger forecast pair logged for later error
/// comparison, spec.md §3 `ShadowPrediction`.
#[derive(Debug, Clone)]
pub struct ShadowPrediction {
    pub shadow_id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub forecast_date: chrono::NaiveDate,
    pub champion_prediction: f64,
    pub challenger_prediction: f64,
    pub actual_demand: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl ShadowPrediction {
    pub fn new(tenant_id: Uuid, store_id: Uuid, product_id: Uuid, forecast_date: chrono::NaiveDate, champion_prediction: f64, challenger_prediction: f64) -> Self {
        Self {
            shadow_id: Uuid::new_v4(),
            tenant_id,
            store_id,
            product_id,
            forecast_date,
            champion_prediction,
            challenger_prediction,
            actual_demand: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(mae: f64, mape: f64, coverage: f64) -> ModelMetrics {
        ModelMetrics { mae, mape, coverage }
    }

    #[test]
    fn first_candidate_auto_promotes() {
        let tenant = Uuid::new_v4();
        let mut registry = Registry::new();
        registry.register(ModelVersion::new_candidate(tenant, "demand_forecast", "v1", metrics(10.0, 0.2, 0.9), "production", vec![]));

        let outcome = registry.evaluate_for_promotion(tenant, "demand_forecast", "v1", metrics(10.0, 0.2, 0.9), DEFAULT_IMPROVEMENT_THRESHOLD).unwrap();
        assert!(outcome.promoted);
        assert_eq!(outcome.reason, "first_champion");
        assert_eq!(registry.champion(tenant, "demand_forecast").unwrap().version, "v1");
    }

    #[test]
    fn promotion_atomically_archives_prior_champion() {
        let tenant = Uuid::new_v4();
        let mut registry = Registry::new();
        registry.register(ModelVersion::new_candidate(tenant, "demand_forecast", "v1", metrics(10.0, 0.2, 0.9), "production", vec![]));
        registry.promote(tenant, "demand_forecast", "v1").unwrap();

        registry.register(ModelVersion::new_candidate(tenant, "demand_forecast", "v2", metrics(9.0, 0.18, 0.9), "production", vec![]));
        let outcome = registry.evaluate_for_promotion(tenant, "demand_forecast", "v2", metrics(9.0, 0.18, 0.9), DEFAULT_IMPROVEMENT_THRESHOLD).unwrap();

        assert!(outcome.promoted);
        assert_eq!(registry.champion(tenant, "demand_forecast").unwrap().version, "v2");
        let archived = registry.versions.get(&(tenant, "demand_forecast".to_string())).unwrap().iter().find(|v| v.version == "v1").unwrap();
        assert_eq!(archived.status, ModelStatus::Archived);
    }

    #[test]
    fn insufficient_improvement_becomes_challenger() {
        let tenant = Uuid::new_v4();
        let mut registry = Registry::new();
        registry.register(ModelVersion::new_candidate(tenant, "demand_forecast", "v1", metrics(10.0, 0.2, 0.9), "production", vec![]));
        registry.promote(tenant, "demand_forecast", "v1").unwrap();

        registry.register(ModelVersion::new_candidate(tenant, "demand_forecast", "v2", metrics(9.9, 0.199, 0.9), "production", vec![]));
        let outcome = registry.evaluate_for_promotion(tenant, "demand_forecast", "v2", metrics(9.9, 0.199, 0.9), DEFAULT_IMPROVEMENT_THRESHOLD).unwrap();

        assert!(!outcome.promoted);
        assert_eq!(registry.challenger(tenant, "demand_forecast").unwrap().version, "v2");
        assert_eq!(registry.champion(tenant, "demand_forecast").unwrap().version, "v1");
    }

    #[test]
    fn canary_routing_is_stable_for_same_key() {
        let tenant = Uuid::new_v4();
        let first = select_model_for_request(tenant, "demand_forecast", "store-42", RoutingStrategy::Canary, 0.5);
        let second = select_model_for_request(tenant, "demand_forecast", "store-42", RoutingStrategy::Canary, 0.5);
        assert_eq!(first, second);
    }

    #[test]
    fn canary_with_zero_weight_always_champion() {
        let tenant = Uuid::new_v4();
        let result = select_model_for_request(tenant, "demand_forecast", "store-1", RoutingStrategy::Canary, 0.0);
        assert_eq!(result, "champion");
    }
}
