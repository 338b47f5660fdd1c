//! Task dispatch for each cadence-table entry (spec.md §4.L). Every
//! function here takes the `Beat` lock appropriate to its `TaskKind`,
//! drives the already-built domain logic in `shelfops-ingestion`/
//! `shelfops-forecasting`/`shelfops-alerts`/`shelfops-master-data`, and
//! returns the `TaskOutcome` structured summary named in spec.md §6's
//! scheduler invocation surface.

use chrono::{NaiveDate, Utc};
use shelfops_alerts::engine::{
    detect_anomalies, detect_ghost_stock, detect_reorder_needed, detect_stockouts, run_alert_pipeline, AlertPublisher,
    AlertRepository,
};
use shelfops_core::{Error as CoreError, TenantContext};
use shelfops_forecasting::arena::{ModelMetrics, ModelVersion, Registry, DEFAULT_IMPROVEMENT_THRESHOLD};
use shelfops_forecasting::backtest::{walk_forward, ActualSale, BacktestParams, ForecastRow, WalkForwardSummary};
use shelfops_forecasting::runtime::{generate_forecasts_for_pair, persist_day, resolve_active_version, ForecastRepository};
use shelfops_forecasting::train::{cross_validate, Regressor};
use shelfops_ingestion::{AdapterKind, IngestionAdapter, SyncResult, SyncStatus};
use tracing::{info, warn};

use crate::beat::Beat;
use crate::cadence::TaskKind;
use crate::error::Result;
use crate::outcome::TaskOutcome;
use crate::ports::{
    ActivePairsSource, AlertInputsSource, AnomalySink, BacktestDataSource, FreshnessSource, LatestFeatureSource,
    ModelArtifactSource, ModelRegistryRepository, OpportunityCostSink, TrainingDataSource,
};

fn fold_sync_result(kind: &str, result: &SyncResult, outcome: TaskOutcome) -> TaskOutcome {
    let outcome = outcome
        .with_count(format!("{kind}_processed"), result.records_processed)
        .with_count(format!("{kind}_failed"), result.records_failed);
    match result.status {
        SyncStatus::Success | SyncStatus::NoData => outcome,
        SyncStatus::Partial => outcome.mark_partial(format!("{kind} partial: {} errors", result.errors.len())),
        SyncStatus::Failed => outcome.mark_partial(format!("{kind} failed: {} errors", result.errors.len())),
    }
}

/// Ingestion adapter sync, spec.md §4.C/§4.L: per-tenant-per-source serial,
/// 3x retry budget (enforced by the caller's job-queue wrapping, not here —
/// this function runs one attempt).
pub async fn run_ingestion_sync(
    beat: &Beat,
    tenant: &TenantContext,
    adapter: &dyn IngestionAdapter,
    since: Option<chrono::DateTime<Utc>>,
) -> Result<TaskOutcome> {
    let source_key: &'static str = match adapter.kind() {
        AdapterKind::Edi => "edi",
        AdapterKind::Sftp => "sftp",
        AdapterKind::EventStream => "event",
        AdapterKind::Pos => "pos",
    };

    beat.run_exclusive(tenant.tenant_id.0, TaskKind::IngestionSync, Some(source_key), || async {
        let mut outcome = TaskOutcome::success("scheduled");

        let stores = adapter.sync_stores().await?;
        outcome = fold_sync_result("stores", &stores, outcome);

        let products = adapter.sync_products().await?;
        outcome = fold_sync_result("products", &products, outcome);

        let transactions = adapter.sync_transactions(since).await?;
        outcome = fold_sync_result("transactions", &transactions, outcome);

        let inventory = adapter.sync_inventory().await?;
        outcome = fold_sync_result("inventory", &inventory, outcome);

        info!(tenant = %tenant.tenant_id, source = source_key, status = ?outcome.status, "ingestion sync complete");
        Ok(outcome)
    })
    .await
}

/// Alert pipeline, spec.md §4.I/§4.L: per-tenant serial, 1x retry budget.
/// Stockout/reorder/anomaly candidates feed `run_alert_pipeline`'s
/// `detect -> deduplicate -> persist -> publish`; ghost-stock emits
/// `Anomaly` rows through a separate sink since it is not an operational
/// `Alert`.
pub async fn run_alert_scan<I: AlertInputsSource, R: AlertRepository, P: AlertPublisher, S: AnomalySink>(
    beat: &Beat,
    tenant: &TenantContext,
    inputs: &I,
    repo: &R,
    publisher: &P,
    anomaly_sink: &S,
    ghost_stock_ratio_threshold: f64,
    ghost_stock_min_days: usize,
) -> Result<TaskOutcome> {
    beat.run_exclusive(tenant.tenant_id.0, TaskKind::AlertPipeline, None, || async {
        let mut candidates = Vec::new();
        candidates.extend(detect_stockouts(&inputs.stockout_inputs(tenant).await?));
        candidates.extend(detect_reorder_needed(&inputs.reorder_inputs(tenant).await?));
        let (anomaly_inputs, stats) = inputs.anomaly_inputs(tenant).await?;
        candidates.extend(detect_anomalies(&anomaly_inputs, &stats));

        let summary = run_alert_pipeline(tenant, candidates, repo, publisher).await?;

        let ghost_inputs = inputs.ghost_stock_inputs(tenant).await?;
        let anomalies = detect_ghost_stock(tenant.tenant_id.0, &ghost_inputs, ghost_stock_ratio_threshold, ghost_stock_min_days);
        let ghost_count = anomalies.len() as u64;
        anomaly_sink.persist_anomalies(tenant, anomalies).await?;

        let mut outcome = TaskOutcome::success("scheduled")
            .with_count("detected", summary.detected as u64)
            .with_count("deduplicated", summary.deduplicated as u64)
            .with_count("persisted", summary.persisted as u64)
            .with_count("ghost_stock_anomalies", ghost_count);
        if !summary.published {
            outcome = outcome.mark_partial("publish failed, alerts persisted");
        }
        Ok(outcome)
    })
    .await
}

/// Walk-forward backtest, spec.md §4.F: fetches the full lookback range up
/// front and slices per-window in memory, since `walk_forward` expects
/// synchronous window closures. Shared by both the T-1 and weekly-90-day
/// cadence rows; `task` picks which lock the run is serialized under.
pub async fn run_backtest<B: BacktestDataSource>(
    beat: &Beat,
    tenant: &TenantContext,
    task: TaskKind,
    today: NaiveDate,
    params: BacktestParams,
    source: &B,
) -> Result<(TaskOutcome, WalkForwardSummary)> {
    let start = today - chrono::Duration::days(params.lookback_days);
    let actuals = source.actuals(tenant, start, today).await?;
    let forecasts = source.forecasts(tenant, start, today).await?;

    let summary = beat
        .run_exclusive(tenant.tenant_id.0, task, None, || async {
            let actuals_for_window = |ws: NaiveDate, we: NaiveDate| -> Vec<ActualSale> {
                actuals.iter().copied().filter(|a| a.date >= ws && a.date < we).collect()
            };
            let forecasts_for_window = |ws: NaiveDate, we: NaiveDate| -> Vec<ForecastRow> {
                forecasts.iter().copied().filter(|f| f.date >= ws && f.date < we).collect()
            };
            walk_forward(today, params, actuals_for_window, forecasts_for_window)
        })
        .await;

    let outcome = if summary.windows_tested == 0 {
        TaskOutcome::skipped("scheduled", "no windows had matching actual/forecast rows")
    } else {
        TaskOutcome::success("scheduled")
            .with_count("windows_tested", summary.windows_tested as u64)
            .with_reason(format!("avg_mae={:.2} avg_mape={:.2}", summary.avg_mae, summary.avg_mape))
    };
    Ok((outcome, summary))
}

/// Retrain, spec.md §4.E/§4.F/§4.L: per-tenant serial, weekly or drift
/// triggered, 2x retry budget. `new_regressor` builds a fresh `Regressor`
/// for both cross-validation folds and the final candidate fit.
pub async fn run_retrain<T: TrainingDataSource, M: ModelRegistryRepository, F, R>(
    beat: &Beat,
    tenant: &TenantContext,
    model_name: &str,
    version: &str,
    feature_tier: &str,
    feature_cols: Vec<String>,
    trigger_reason: &str,
    training_source: &T,
    registry_repo: &M,
    mut new_regressor: F,
) -> Result<TaskOutcome>
where
    F: FnMut() -> R,
    R: Regressor,
{
    beat.run_exclusive(tenant.tenant_id.0, TaskKind::Retrain, None, || async {
        let (x, y) = training_source.load_training_matrix(tenant).await?;
        if x.is_empty() {
            return Ok(TaskOutcome::skipped(trigger_reason, "no training rows available"));
        }

        let metrics: ModelMetrics = cross_validate(&x, &y, &mut new_regressor).map_err(|e| CoreError::internal(e.to_string()))?;

        let candidate = ModelVersion::new_candidate(tenant.tenant_id.0, model_name, version, metrics, feature_tier, feature_cols);
        registry_repo.persist_candidate(tenant, &candidate).await?;

        let mut registry = Registry::new();
        let champion = registry_repo.current_champion(tenant, model_name).await?;
        let had_champion = champion.is_some();
        if let Some(champion) = champion {
            registry.register(champion);
        }
        registry.register(candidate);

        let promotion = registry
            .evaluate_for_promotion(tenant.tenant_id.0, model_name, version, metrics, DEFAULT_IMPROVEMENT_THRESHOLD)
            .map_err(CoreError::internal)?;

        registry_repo
            .persist_promotion(tenant, model_name, version, &metrics, promotion.promoted, &promotion.reason)
            .await?;

        info!(tenant = %tenant.tenant_id, model = model_name, version, promoted = promotion.promoted, reason = %promotion.reason, "retrain evaluation complete");

        let mut outcome = TaskOutcome::success(trigger_reason)
            .with_reason(format!("trigger={trigger_reason} promoted={} reason={}", promotion.promoted, promotion.reason));
        if !had_champion {
            outcome = outcome.with_reason("no prior champion, candidate auto-promoted");
        }
        Ok(outcome)
    })
    .await
}

/// Forecast generation, spec.md §4.G/§4.L: per-tenant serial, runs after
/// retrain. Resolves the active version, loads its artifact once, then
/// generates and persists per pair per day.
#[allow(clippy::too_many_arguments)]
pub async fn run_forecast_generation<
    A: ActivePairsSource,
    L: LatestFeatureSource,
    M: ModelArtifactSource,
    R: ForecastRepository,
>(
    beat: &Beat,
    tenant: &TenantContext,
    model_name: &str,
    explicit_override: Option<&str>,
    last_known_champion: Option<&str>,
    registry: &Registry,
    today: NaiveDate,
    horizon_days: i64,
    confidence_level: f64,
    pairs_source: &A,
    feature_source: &L,
    artifact_source: &M,
    forecast_repo: &R,
) -> Result<TaskOutcome> {
    beat.run_exclusive(tenant.tenant_id.0, TaskKind::ForecastGeneration, None, || async {
        let version = resolve_active_version(registry, tenant.tenant_id.0, model_name, explicit_override, last_known_champion)?.to_string();

        let artifact = match artifact_source.load_artifact(tenant, model_name, &version).await? {
            Some(a) => a,
            None => return Ok(TaskOutcome::skipped("scheduled", format!("no artifact registered for version {version}"))),
        };

        let pairs = pairs_source.active_pairs(tenant).await?;
        if pairs.is_empty() {
            return Ok(TaskOutcome::skipped("scheduled", "no active (store, product) pairs"));
        }

        let mut by_day: std::collections::BTreeMap<NaiveDate, Vec<shelfops_forecasting::runtime::DemandForecast>> = std::collections::BTreeMap::new();
        let mut pairs_forecasted = 0u64;
        let mut pairs_skipped = 0u64;

        for (store_id, product_id) in pairs {
            let Some(feature) = feature_source.latest_feature(tenant, store_id, product_id).await? else {
                pairs_skipped += 1;
                continue;
            };
            let rows = generate_forecasts_for_pair(&artifact, &feature, today, horizon_days, confidence_level, None)?;
            for row in rows {
                by_day.entry(row.forecast_date).or_default().push(row);
            }
            pairs_forecasted += 1;
        }

        let days = by_day.len() as u64;
        for (date, rows) in by_day {
            persist_day(forecast_repo, tenant, &version, date, rows).await?;
        }

        let mut outcome = TaskOutcome::success("scheduled")
            .with_count("pairs_forecasted", pairs_forecasted)
            .with_count("pairs_skipped", pairs_skipped)
            .with_count("days", days)
            .with_reason(format!("model_version={version}"));
        if pairs_skipped > 0 {
            outcome = outcome.mark_partial(format!("{pairs_skipped} pairs had no feature row"));
        }
        Ok(outcome)
    })
    .await
}

/// Opportunity cost, spec.md §3/§12/§4.L: per-tenant, daily 04:00.
pub async fn run_opportunity_cost<S: OpportunityCostSink>(beat: &Beat, tenant: &TenantContext, sink: &S) -> Result<TaskOutcome> {
    beat.run_exclusive(tenant.tenant_id.0, TaskKind::OpportunityCost, None, || async {
        let pending = sink.pending_estimates(tenant).await?;
        if pending.is_empty() {
            return Ok(TaskOutcome::skipped("scheduled", "no dismissed/ignored alerts since last run"));
        }
        let logs: Vec<_> = pending
            .iter()
            .map(|(alert, cost, reason)| shelfops_alerts::model::OpportunityCostLog::new(tenant.tenant_id.0, alert.id, *cost, reason.clone()))
            .collect();
        let count = logs.len() as u64;
        sink.persist(tenant, logs).await?;
        Ok(TaskOutcome::success("scheduled").with_count("logged", count))
    })
    .await
}

/// Ghost stock, spec.md §4.I/§4.L: per-tenant, daily 04:30. Runs the
/// ghost-stock detector on its own cadence, independent of the alert
/// pipeline's bundled pass.
pub async fn run_ghost_stock<I: AlertInputsSource, S: AnomalySink>(
    beat: &Beat,
    tenant: &TenantContext,
    inputs: &I,
    sink: &S,
    ratio_threshold: f64,
    min_days: usize,
) -> Result<TaskOutcome> {
    beat.run_exclusive(tenant.tenant_id.0, TaskKind::GhostStock, None, || async {
        let ghost_inputs = inputs.ghost_stock_inputs(tenant).await?;
        let anomalies = detect_ghost_stock(tenant.tenant_id.0, &ghost_inputs, ratio_threshold, min_days);
        let count = anomalies.len() as u64;
        sink.persist_anomalies(tenant, anomalies).await?;
        if count == 0 {
            Ok(TaskOutcome::skipped("scheduled", "no ghost-stock candidates found"))
        } else {
            Ok(TaskOutcome::success("scheduled").with_count("anomalies", count))
        }
    })
    .await
}

/// ML anomaly detection, spec.md §4.I/§4.L: per-tenant, every 6h. Reuses
/// the same detector and pipeline as the alert scan, on its own cadence,
/// so a drift that emerges between 15-minute alert-scan runs still
/// surfaces within 6 hours.
pub async fn run_ml_anomaly_detection<I: AlertInputsSource, R: AlertRepository, P: AlertPublisher>(
    beat: &Beat,
    tenant: &TenantContext,
    inputs: &I,
    repo: &R,
    publisher: &P,
) -> Result<TaskOutcome> {
    beat.run_exclusive(tenant.tenant_id.0, TaskKind::MlAnomalyDetection, None, || async {
        let (anomaly_inputs, stats) = inputs.anomaly_inputs(tenant).await?;
        let candidates = detect_anomalies(&anomaly_inputs, &stats);
        if candidates.is_empty() {
            return Ok(TaskOutcome::skipped("scheduled", "no anomaly candidates above threshold"));
        }

        let summary = run_alert_pipeline(tenant, candidates, repo, publisher).await?;
        let mut outcome = TaskOutcome::success("scheduled")
            .with_count("detected", summary.detected as u64)
            .with_count("persisted", summary.persisted as u64);
        if !summary.published {
            outcome = outcome.mark_partial("publish failed, alerts persisted");
        }
        Ok(outcome)
    })
    .await
}

/// Data freshness, spec.md §4.L: hourly, per-tenant. Flags any adapter
/// whose last successful sync is older than `max_staleness_hours`.
pub async fn run_data_freshness<F: FreshnessSource>(beat: &Beat, tenant: &TenantContext, source: &F, max_staleness_hours: i64) -> Result<TaskOutcome> {
    beat.run_exclusive(tenant.tenant_id.0, TaskKind::DataFreshness, None, || async {
        let logs = source.last_sync_logs(tenant).await?;
        let now = Utc::now();
        let mut stale = Vec::new();
        for log in &logs {
            if let Some(completed_at) = log.result.completed_at {
                if (now - completed_at).num_hours() > max_staleness_hours {
                    stale.push(log.sync_type.clone());
                }
            }
        }
        let mut outcome = TaskOutcome::success("scheduled").with_count("sources_checked", logs.len() as u64).with_count("stale_sources", stale.len() as u64);
        for source_name in &stale {
            warn!(tenant = %tenant.tenant_id, source = %source_name, "sync source exceeded freshness threshold");
            outcome = outcome.with_reason(format!("{source_name} stale beyond {max_staleness_hours}h"));
        }
        Ok(outcome)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shelfops_alerts::engine::{AnomalyCandidateInput, FeaturePopulationStats, GhostStockInput, ReorderCandidateInput, StockoutCandidateInput};
    use shelfops_alerts::model::{Alert, Anomaly, OpportunityCostLog};
    use shelfops_core::types::TenantId;
    use shelfops_forecasting::runtime::LatestFeatureRow;
    use shelfops_forecasting::train::ModelArtifact;
    use shelfops_ingestion::IntegrationSyncLog;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    fn tenant() -> TenantContext {
        TenantContext::new(TenantId::new(), "tenant_test")
    }

    struct FixtureAdapter {
        kind: AdapterKind,
        calls: Arc<AtomicU64>,
    }

    #[async_trait]
    impl IngestionAdapter for FixtureAdapter {
        fn kind(&self) -> AdapterKind {
            self.kind
        }

        async fn test_connection(&self) -> shelfops_ingestion::Result<bool> {
            Ok(true)
        }

        async fn sync_stores(&self) -> shelfops_ingestion::Result<SyncResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut r = SyncResult::new(SyncStatus::Success);
            r.record_success(3);
            Ok(r.complete())
        }

        async fn sync_products(&self) -> shelfops_ingestion::Result<SyncResult> {
            let mut r = SyncResult::new(SyncStatus::Success);
            r.record_success(5);
            Ok(r.complete())
        }

        async fn sync_transactions(&self, _since: Option<chrono::DateTime<Utc>>) -> shelfops_ingestion::Result<SyncResult> {
            let mut r = SyncResult::new(SyncStatus::Success);
            r.record_error("timeout on row 4");
            r.record_success(10);
            Ok(r.complete())
        }

        async fn sync_inventory(&self) -> shelfops_ingestion::Result<SyncResult> {
            Ok(SyncResult::no_data())
        }
    }

    #[tokio::test]
    async fn ingestion_sync_rolls_up_partial_status_and_counts() {
        let beat = Beat::new();
        let t = tenant();
        let adapter = FixtureAdapter { kind: AdapterKind::Pos, calls: Arc::new(AtomicU64::new(0)) };

        let outcome = run_ingestion_sync(&beat, &t, &adapter, None).await.unwrap();
        assert_eq!(outcome.status, crate::outcome::TaskStatus::Partial);
        assert_eq!(outcome.counts.get("stores_processed"), Some(&3));
        assert_eq!(outcome.counts.get("transactions_failed"), Some(&1));
    }

    struct EmptyAlertInputs;

    #[async_trait]
    impl AlertInputsSource for EmptyAlertInputs {
        async fn stockout_inputs(&self, _tenant: &TenantContext) -> shelfops_core::Result<Vec<StockoutCandidateInput>> {
            Ok(vec![])
        }
        async fn reorder_inputs(&self, _tenant: &TenantContext) -> shelfops_core::Result<Vec<ReorderCandidateInput>> {
            Ok(vec![])
        }
        async fn anomaly_inputs(&self, _tenant: &TenantContext) -> shelfops_core::Result<(Vec<AnomalyCandidateInput>, FeaturePopulationStats)> {
            Ok((vec![], FeaturePopulationStats::default()))
        }
        async fn ghost_stock_inputs(&self, _tenant: &TenantContext) -> shelfops_core::Result<Vec<GhostStockInput>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct NullAlertSink {
        persisted: std::sync::Mutex<Vec<Alert>>,
    }

    #[async_trait]
    impl AlertRepository for NullAlertSink {
        async fn open_alert_keys(&self, _tenant: &TenantContext) -> shelfops_core::Result<HashSet<(Uuid, Uuid, String)>> {
            Ok(HashSet::new())
        }
        async fn insert_alerts(&self, _tenant: &TenantContext, alerts: Vec<Alert>) -> shelfops_core::Result<Vec<Alert>> {
            self.persisted.lock().unwrap().extend(alerts.iter().cloned());
            Ok(alerts)
        }
    }

    #[async_trait]
    impl AlertPublisher for NullAlertSink {
        async fn publish(&self, _tenant: &TenantContext, _alerts: &[Alert]) -> shelfops_core::Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl AnomalySink for NullAlertSink {
        async fn persist_anomalies(&self, _tenant: &TenantContext, _anomalies: Vec<Anomaly>) -> shelfops_core::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn alert_scan_skips_cleanly_with_no_candidates() {
        let beat = Beat::new();
        let t = tenant();
        let inputs = EmptyAlertInputs;
        let sink = NullAlertSink::default();

        let outcome = run_alert_scan(&beat, &t, &inputs, &sink, &sink, &sink, 0.3, 3).await.unwrap();
        assert_eq!(outcome.status, crate::outcome::TaskStatus::Success);
        assert_eq!(outcome.counts.get("detected"), Some(&0));
    }

    struct FixtureBacktestSource;

    #[async_trait]
    impl BacktestDataSource for FixtureBacktestSource {
        async fn actuals(&self, _tenant: &TenantContext, _start: NaiveDate, _end: NaiveDate) -> shelfops_core::Result<Vec<ActualSale>> {
            Ok(vec![])
        }
        async fn forecasts(&self, _tenant: &TenantContext, _start: NaiveDate, _end: NaiveDate) -> shelfops_core::Result<Vec<ForecastRow>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn backtest_with_no_rows_is_skipped() {
        let beat = Beat::new();
        let t = tenant();
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let (outcome, summary) = run_backtest(&beat, &t, TaskKind::BacktestTMinus1, today, BacktestParams::T_MINUS_1, &FixtureBacktestSource).await.unwrap();
        assert_eq!(outcome.status, crate::outcome::TaskStatus::Skipped);
        assert_eq!(summary.windows_tested, 0);
    }

    struct EmptyTrainingSource;

    #[async_trait]
    impl TrainingDataSource for EmptyTrainingSource {
        async fn load_training_matrix(&self, _tenant: &TenantContext) -> shelfops_core::Result<(Vec<Vec<f64>>, Vec<f64>)> {
            Ok((vec![], vec![]))
        }
    }

    struct NullRegistryRepo;

    #[async_trait]
    impl ModelRegistryRepository for NullRegistryRepo {
        async fn current_champion(&self, _tenant: &TenantContext, _model_name: &str) -> shelfops_core::Result<Option<ModelVersion>> {
            Ok(None)
        }
        async fn persist_candidate(&self, _tenant: &TenantContext, _version: &ModelVersion) -> shelfops_core::Result<()> {
            Ok(())
        }
        async fn persist_promotion(&self, _tenant: &TenantContext, _model_name: &str, _version: &str, _metrics: &ModelMetrics, _promoted: bool, _reason: &str) -> shelfops_core::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn retrain_skips_when_no_training_rows() {
        let beat = Beat::new();
        let t = tenant();
        let outcome = run_retrain(
            &beat,
            &t,
            "demand_forecast",
            "v1",
            "production",
            vec![],
            "scheduled",
            &EmptyTrainingSource,
            &NullRegistryRepo,
            shelfops_forecasting::train::GradientBaselineRegressor::new,
        )
        .await
        .unwrap();
        assert_eq!(outcome.status, crate::outcome::TaskStatus::Skipped);
    }

    struct EmptyPairsSource;

    #[async_trait]
    impl ActivePairsSource for EmptyPairsSource {
        async fn active_pairs(&self, _tenant: &TenantContext) -> shelfops_core::Result<Vec<(Uuid, Uuid)>> {
            Ok(vec![])
        }
    }

    struct NullFeatureSource;

    #[async_trait]
    impl LatestFeatureSource for NullFeatureSource {
        async fn latest_feature(&self, _tenant: &TenantContext, _store_id: Uuid, _product_id: Uuid) -> shelfops_core::Result<Option<LatestFeatureRow>> {
            Ok(None)
        }
    }

    struct NullArtifactSource;

    #[async_trait]
    impl ModelArtifactSource for NullArtifactSource {
        async fn load_artifact(&self, _tenant: &TenantContext, _model_name: &str, _version: &str) -> shelfops_core::Result<Option<ModelArtifact>> {
            Ok(None)
        }
    }

    struct NullForecastRepo;

    #[async_trait]
    impl ForecastRepository for NullForecastRepo {
        async fn replace_forecasts_for_day(&self, _tenant: &TenantContext, _model_version: &str, _forecast_date: NaiveDate, _rows: Vec<shelfops_forecasting::runtime::DemandForecast>) -> shelfops_core::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn forecast_generation_skips_with_no_active_pairs() {
        let beat = Beat::new();
        let t = tenant();
        let mut registry = Registry::new();
        registry.register(ModelVersion::new_candidate(t.tenant_id.0, "demand_forecast", "v1", ModelMetrics::default(), "production", vec![]));
        registry.promote(t.tenant_id.0, "demand_forecast", "v1").unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let outcome = run_forecast_generation(
            &beat,
            &t,
            "demand_forecast",
            None,
            None,
            &registry,
            today,
            7,
            0.9,
            &EmptyPairsSource,
            &NullFeatureSource,
            &NullArtifactSource,
            &NullForecastRepo,
        )
        .await
        .unwrap();
        assert_eq!(outcome.status, crate::outcome::TaskStatus::Skipped);
    }

    struct EmptyOpportunityCostSink;

    #[async_trait]
    impl OpportunityCostSink for EmptyOpportunityCostSink {
        async fn pending_estimates(&self, _tenant: &TenantContext) -> shelfops_core::Result<Vec<(Alert, f64, String)>> {
            Ok(vec![])
        }
        async fn persist(&self, _tenant: &TenantContext, _logs: Vec<OpportunityCostLog>) -> shelfops_core::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn opportunity_cost_skips_with_nothing_pending() {
        let beat = Beat::new();
        let t = tenant();
        let outcome = run_opportunity_cost(&beat, &t, &EmptyOpportunityCostSink).await.unwrap();
        assert_eq!(outcome.status, crate::outcome::TaskStatus::Skipped);
    }

    struct StaleFreshnessSource;

    #[async_trait]
    impl FreshnessSource for StaleFreshnessSource {
        async fn last_sync_logs(&self, _tenant: &TenantContext) -> shelfops_core::Result<Vec<IntegrationSyncLog>> {
            let mut result = SyncResult::new(SyncStatus::Success);
            result.record_success(1);
            let mut result = result.complete();
            result.completed_at = Some(Utc::now() - chrono::Duration::hours(10));
            Ok(vec![IntegrationSyncLog::new(AdapterKind::Pos, "transactions", result)])
        }
    }

    #[tokio::test]
    async fn data_freshness_flags_stale_sources() {
        let beat = Beat::new();
        let t = tenant();
        let outcome = run_data_freshness(&beat, &t, &StaleFreshnessSource, 6).await.unwrap();
        assert_eq!(outcome.counts.get("stale_sources"), Some(&1));
        assert_eq!(outcome.reasons.len(), 1);
    }
}
