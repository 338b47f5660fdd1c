//! Seams the scheduler's task handlers call through instead of reaching
//! into a database directly. `shelfops_core`/`shelfops_ingestion`/
//! `shelfops_alerts`/`shelfops_forecasting` already define the seams a
//! single task needs (`IngestionAdapter`, `AlertRepository`,
//! `ForecastRepository`, ...); the traits here cover the remaining gaps —
//! mostly "which (store, product) pairs does this tenant care about
//! today" and "what did we last observe" — that a real deployment
//! implements against its own schema.

use async_trait::async_trait;
use chrono::NaiveDate;
use shelfops_alerts::engine::{
    AnomalyCandidateInput, FeaturePopulationStats, GhostStockInput, ReorderCandidateInput, StockoutCandidateInput,
};
use shelfops_alerts::model::{Alert, Anomaly, OpportunityCostLog};
use shelfops_forecasting::arena::{ModelMetrics, ModelVersion};
use shelfops_forecasting::backtest::{ActualSale, ForecastRow};
use shelfops_forecasting::runtime::LatestFeatureRow;
use shelfops_forecasting::train::ModelArtifact;
use shelfops_ingestion::IntegrationSyncLog;
use uuid::Uuid;

use shelfops_core::{Result, TenantContext};

/// Supplies the actual-sale/forecast rows a backtest window needs. Both
/// methods return every row with `date` in `[start, end)` for the tenant;
/// the task handler slices further per-window in memory, since
/// `shelfops_forecasting::backtest::walk_forward` expects synchronous
/// window-lookup closures.
#[async_trait]
pub trait BacktestDataSource: Send + Sync {
    async fn actuals(&self, tenant: &TenantContext, start: NaiveDate, end: NaiveDate) -> Result<Vec<ActualSale>>;
    async fn forecasts(&self, tenant: &TenantContext, start: NaiveDate, end: NaiveDate) -> Result<Vec<ForecastRow>>;
}

/// Training-data matrix for the active model, already feature-engineered
/// (spec.md §4.D); `y` is the demand target.
#[async_trait]
pub trait TrainingDataSource: Send + Sync {
    async fn load_training_matrix(&self, tenant: &TenantContext) -> Result<(Vec<Vec<f64>>, Vec<f64>)>;
}

/// Persistence for the model arena: reading the current champion's
/// metrics and recording a new candidate/promotion outcome. A real
/// implementation backs this with the `model_versions` table named in
/// spec.md §3; `shelfops_forecasting::arena::Registry` stays in-memory
/// for the duration of one retrain run.
#[async_trait]
pub trait ModelRegistryRepository: Send + Sync {
    async fn current_champion(&self, tenant: &TenantContext, model_name: &str) -> Result<Option<ModelVersion>>;
    async fn persist_candidate(&self, tenant: &TenantContext, version: &ModelVersion) -> Result<()>;
    async fn persist_promotion(&self, tenant: &TenantContext, model_name: &str, version: &str, metrics: &ModelMetrics, promoted: bool, reason: &str) -> Result<()>;
}

/// The (store, product) pairs a forecast-generation/reorder-recompute run
/// should cover for a tenant, scoped to active planogram assignments.
#[async_trait]
pub trait ActivePairsSource: Send + Sync {
    async fn active_pairs(&self, tenant: &TenantContext) -> Result<Vec<(Uuid, Uuid)>>;
}

/// Persists a day's opportunity-cost estimates, spec.md §12.
#[async_trait]
pub trait OpportunityCostSink: Send + Sync {
    /// Candidate alerts that were dismissed/ignored since the last run,
    /// paired with the estimated lost-margin cost of that inaction.
    async fn pending_estimates(&self, tenant: &TenantContext) -> Result<Vec<(Alert, f64, String)>>;
    async fn persist(&self, tenant: &TenantContext, logs: Vec<OpportunityCostLog>) -> Result<()>;
}

/// Last-sync bookkeeping per adapter, spec.md §4.L "Data freshness".
#[async_trait]
pub trait FreshnessSource: Send + Sync {
    async fn last_sync_logs(&self, tenant: &TenantContext) -> Result<Vec<IntegrationSyncLog>>;
}

/// The pair's most recent causal feature row plus the model artifact to
/// predict with, for forecast generation (spec.md §4.G steps 2-3).
#[async_trait]
pub trait LatestFeatureSource: Send + Sync {
    async fn latest_feature(&self, tenant: &TenantContext, store_id: Uuid, product_id: Uuid) -> Result<Option<LatestFeatureRow>>;
}

/// Loads the registered artifact for a resolved model version. Artifacts
/// are immutable once registered (spec.md §5), so this is a plain lookup,
/// never a mutation.
#[async_trait]
pub trait ModelArtifactSource: Send + Sync {
    async fn load_artifact(&self, tenant: &TenantContext, model_name: &str, version: &str) -> Result<Option<ModelArtifact>>;
}

/// Supplies the raw detector inputs for the alert pipeline (spec.md §4.I):
/// assembling these from stores/products/inventory/forecasts is a
/// deployment-specific join; this trait is the seam a real deployment
/// implements against its own schema. `anomaly_inputs` also returns the
/// population statistics the composite z-score is computed against.
#[async_trait]
pub trait AlertInputsSource: Send + Sync {
    async fn stockout_inputs(&self, tenant: &TenantContext) -> Result<Vec<StockoutCandidateInput>>;
    async fn reorder_inputs(&self, tenant: &TenantContext) -> Result<Vec<ReorderCandidateInput>>;
    async fn anomaly_inputs(&self, tenant: &TenantContext) -> Result<(Vec<AnomalyCandidateInput>, FeaturePopulationStats)>;
    async fn ghost_stock_inputs(&self, tenant: &TenantContext) -> Result<Vec<GhostStockInput>>;
}

/// Persists `Anomaly` rows, used by the ghost-stock detector (which emits
/// an `inventory_discrepancy` `Anomaly`, not an operational `Alert`).
#[async_trait]
pub trait AnomalySink: Send + Sync {
    async fn persist_anomalies(&self, tenant: &TenantContext, anomalies: Vec<Anomaly>) -> Result<()>;
}
