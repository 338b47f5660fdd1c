//! The scheduler's cadence table, spec.md §4.L. Each row names a task
//! kind, its retry budget, and how the per-tenant `Beat` lock scopes it
//! (whole-tenant serial, or serial per an extra key such as the adapter
//! source). Interval/time-of-day values live in
//! `shelfops_core::config::SchedulerConfig`; this table only carries what
//! doesn't already have a home there.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    IngestionSync,
    AlertPipeline,
    BacktestTMinus1,
    WeeklyBacktest,
    Retrain,
    ForecastGeneration,
    OpportunityCost,
    GhostStock,
    MlAnomalyDetection,
    DataFreshness,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::IngestionSync => "ingestion_sync",
            TaskKind::AlertPipeline => "alert_pipeline",
            TaskKind::BacktestTMinus1 => "backtest_t_minus_1",
            TaskKind::WeeklyBacktest => "weekly_backtest",
            TaskKind::Retrain => "retrain",
            TaskKind::ForecastGeneration => "forecast_generation",
            TaskKind::OpportunityCost => "opportunity_cost",
            TaskKind::GhostStock => "ghost_stock",
            TaskKind::MlAnomalyDetection => "ml_anomaly_detection",
            TaskKind::DataFreshness => "data_freshness",
        }
    }

    pub fn cadence(&self) -> CadenceSpec {
        CADENCE_TABLE.iter().find(|row| row.task == *self).copied().expect("every TaskKind has a cadence row")
    }
}

/// Whether a task's `Beat` lock is scoped to the whole tenant or further
/// split by an extra key (e.g. one lock per ingestion adapter source, so
/// two sources for the same tenant can sync concurrently).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    Tenant,
    TenantAndSource,
}

#[derive(Debug, Clone, Copy)]
pub struct CadenceSpec {
    pub task: TaskKind,
    pub max_attempts: u32,
    pub lock_scope: LockScope,
}

pub const CADENCE_TABLE: &[CadenceSpec] = &[
    CadenceSpec { task: TaskKind::IngestionSync, max_attempts: 3, lock_scope: LockScope::TenantAndSource },
    CadenceSpec { task: TaskKind::AlertPipeline, max_attempts: 1, lock_scope: LockScope::Tenant },
    CadenceSpec { task: TaskKind::BacktestTMinus1, max_attempts: 2, lock_scope: LockScope::Tenant },
    CadenceSpec { task: TaskKind::WeeklyBacktest, max_attempts: 2, lock_scope: LockScope::Tenant },
    CadenceSpec { task: TaskKind::Retrain, max_attempts: 2, lock_scope: LockScope::Tenant },
    CadenceSpec { task: TaskKind::ForecastGeneration, max_attempts: 2, lock_scope: LockScope::Tenant },
    CadenceSpec { task: TaskKind::OpportunityCost, max_attempts: 2, lock_scope: LockScope::Tenant },
    CadenceSpec { task: TaskKind::GhostStock, max_attempts: 2, lock_scope: LockScope::Tenant },
    CadenceSpec { task: TaskKind::MlAnomalyDetection, max_attempts: 2, lock_scope: LockScope::Tenant },
    CadenceSpec { task: TaskKind::DataFreshness, max_attempts: 2, lock_scope: LockScope::Tenant },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_task_kind_resolves_a_cadence_row() {
        let kinds = [
            TaskKind::IngestionSync,
            TaskKind::AlertPipeline,
            TaskKind::BacktestTMinus1,
            TaskKind::WeeklyBacktest,
            TaskKind::Retrain,
            TaskKind::ForecastGeneration,
            TaskKind::OpportunityCost,
            TaskKind::GhostStock,
            TaskKind::MlAnomalyDetection,
            TaskKind::DataFreshness,
        ];
        for kind in kinds {
            assert_eq!(kind.cadence().task, kind);
        }
    }

    #[test]
    fn ingestion_sync_is_the_only_source_scoped_lock() {
        let source_scoped: Vec<_> = CADENCE_TABLE.iter().filter(|r| r.lock_scope == LockScope::TenantAndSource).collect();
        assert_eq!(source_scoped.len(), 1);
        assert_eq!(source_scoped[0].task, TaskKind::IngestionSync);
    }

    #[test]
    fn alert_pipeline_retries_once_per_spec() {
        assert_eq!(TaskKind::AlertPipeline.cadence().max_attempts, 1);
    }
}
