//! The daily replay loop, spec.md §4.K step 2-3. Grounded on
//! `run_replay_simulation.py`'s `main()`: same per-day sequence (retrain
//! check, predict, score, HITL PO review, promotion review after 30
//! observed days), reworked into one `Result`-returning call instead of a
//! script with side-effecting file writes. Determinism (spec.md §8
//! scenario 6) rules out `Utc::now()` calls inside the loop: every
//! timestamp in the output comes from the caller-supplied `run_at`.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shelfops_forecasting::backtest::{evaluate_window, ActualSale, BacktestWindowResult, ForecastRow};
use shelfops_forecasting::train::{ExponentialSmoothingRegressor, GradientBaselineRegressor, Regressor};

use crate::error::{ReplayError, Result};
use crate::hitl_policy::{self, PoAction, PromotionDecision};
use crate::thresholds::{self, ReplayThresholds, SummaryMetrics};
use crate::triggers::{self, RetrainCadence};

/// One (store, product, date) observation with its feature vector
/// already built, spec.md §4.K step 1. The simulator is agnostic to how
/// features were engineered; callers typically build this from
/// `shelfops_forecasting::features::ColdStartRow::to_vec()`.
#[derive(Debug, Clone)]
pub struct ReplayFeatureRow {
    pub date: NaiveDate,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub features: Vec<f64>,
    pub quantity: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ReplayConfig {
    pub retrain_cadence: RetrainCadence,
    pub forecast_horizon_days: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub max_training_rows: usize,
    pub max_replay_days: usize,
    pub po_decisions_per_day: usize,
    pub drift_mape_threshold: f64,
    pub portfolio_mode: PortfolioMode,
    pub portfolio_max_eval_rows: usize,
    pub run_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortfolioMode {
    Off,
    Auto,
}

impl Default for ReplayConfig {
    /// Mirrors `run_replay_simulation.py`'s argparse defaults, aside from
    /// `--holdout-days`/`--dataset-dir`, which belong to `partition`, and
    /// `run_at`, which has no sane default (callers must supply it).
    fn default() -> Self {
        Self {
            retrain_cadence: RetrainCadence::Weekly,
            forecast_horizon_days: 14,
            start_date: None,
            end_date: None,
            max_training_rows: 400_000,
            max_replay_days: 365,
            po_decisions_per_day: 3,
            drift_mape_threshold: 28.0,
            portfolio_mode: PortfolioMode::Auto,
            portfolio_max_eval_rows: 10_000,
            run_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Success,
    SkippedNoRows,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub reasons: Vec<String>,
    pub version: String,
    pub train_end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlDecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub decision_type: String,
    pub reason_code: String,
    pub impacted_entity_id: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionEvent {
    pub model_version: String,
    pub gate_passed: bool,
    pub decision: String,
    pub reason_code: String,
    pub candidate_summary: SummaryMetrics,
    pub champion_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayOutcome {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub model_version: Option<String>,
    pub metrics: Option<BacktestWindowResult>,
    pub retrain_triggered: bool,
    pub retrain_reasons: Vec<String>,
    pub po_decision_counts: HashMap<String, u32>,
    pub promotion_event: Option<PromotionEvent>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioCandidate {
    pub primary_weight: f64,
    pub secondary_weight: f64,
    pub metrics: BacktestWindowResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub evaluated_rows: usize,
    pub candidates: Vec<PortfolioCandidate>,
    pub recommended: PortfolioCandidate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub generated_at: DateTime<Utc>,
    pub replay_days: usize,
    pub retrain_count: u32,
    pub critical_failures: u64,
    pub baseline_metrics: SummaryMetrics,
    pub gate_passed: bool,
    pub gate_failures: Vec<String>,
    pub portfolio: Option<PortfolioReport>,
    pub trigger_events: Vec<TriggerEvent>,
    pub hitl_decisions: Vec<HitlDecisionRecord>,
    pub daily_log: Vec<DayOutcome>,
}

fn empty_po_counts() -> HashMap<String, u32> {
    [PoAction::Approve, PoAction::Edit, PoAction::Reject].into_iter().map(|a| (a.as_str().to_string(), 0)).collect()
}

fn design_matrix(rows: &[&ReplayFeatureRow]) -> (Vec<Vec<f64>>, Vec<f64>) {
    (rows.iter().map(|r| r.features.clone()).collect(), rows.iter().map(|r| r.quantity).collect())
}

/// Keeps the most recent `max_rows` rows by index order (rows are
/// expected pre-sorted by date), matching `_limit_training_rows`'s
/// `df.tail(max_rows)`.
fn limit_training_rows<'a>(rows: &[&'a ReplayFeatureRow], max_rows: usize) -> Vec<&'a ReplayFeatureRow> {
    if max_rows == 0 || rows.len() <= max_rows {
        return rows.to_vec();
    }
    rows[rows.len() - max_rows..].to_vec()
}

/// Runs the daily replay loop over `rows`' holdout partition (everything
/// after `train_end_date`), spec.md §4.K steps 2-3. `new_regressor` is
/// called once per retrain so state never leaks across model versions,
/// mirroring `shelfops_forecasting::train::cross_validate`'s factory
/// pattern.
pub fn run_replay<F, R>(rows: &[ReplayFeatureRow], train_end_date: NaiveDate, config: &ReplayConfig, mut new_regressor: F) -> Result<ReplaySummary>
where
    F: FnMut() -> R,
    R: Regressor,
{
    let mut sorted_rows: Vec<&ReplayFeatureRow> = rows.iter().collect();
    sorted_rows.sort_by_key(|r| r.date);

    let mut holdout: Vec<&ReplayFeatureRow> = sorted_rows.iter().copied().filter(|r| r.date > train_end_date).collect();
    if holdout.is_empty() {
        return Err(ReplayError::EmptyHoldout { train_end_date: train_end_date.to_string() });
    }
    if let Some(start) = config.start_date {
        holdout.retain(|r| r.date >= start);
    }
    if let Some(end) = config.end_date {
        holdout.retain(|r| r.date <= end);
    }

    let mut replay_dates: Vec<NaiveDate> = holdout.iter().map(|r| r.date).collect();
    replay_dates.sort();
    replay_dates.dedup();
    if config.max_replay_days > 0 && replay_dates.len() > config.max_replay_days {
        replay_dates.truncate(config.max_replay_days);
    }
    if replay_dates.is_empty() {
        return Err(ReplayError::NoReplayDates);
    }

    let mut rows_by_date: HashMap<NaiveDate, Vec<&ReplayFeatureRow>> = HashMap::new();
    for row in &holdout {
        rows_by_date.entry(row.date).or_default().push(row);
    }

    let mut models: HashMap<String, R> = HashMap::new();
    let mut current_version: Option<String> = None;
    let mut model_seq: u32 = 0;
    let mut retrain_count: u32 = 0;
    let mut critical_failures: u64 = 0;
    let mut champion_version: Option<String> = None;
    let mut version_decided: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut version_metrics: HashMap<String, Vec<BacktestWindowResult>> = HashMap::new();
    let mut trigger_events: Vec<TriggerEvent> = Vec::new();
    let mut hitl_decisions: Vec<HitlDecisionRecord> = Vec::new();
    let mut daily_log: Vec<DayOutcome> = Vec::with_capacity(replay_dates.len());

    for (idx, &day) in replay_dates.iter().enumerate() {
        let day_rows = rows_by_date.get(&day).cloned().unwrap_or_default();

        let mut retrain_reasons: Vec<String> = Vec::new();
        if current_version.is_none() {
            retrain_reasons.push("initial".to_string());
        } else if let Some(reason) = triggers::scheduled_trigger(config.retrain_cadence, idx) {
            retrain_reasons.push(reason.to_string());
        }
        if let Some(version) = &current_version {
            if let Some(windows) = version_metrics.get(version) {
                let recent: Vec<BacktestWindowResult> = windows.iter().rev().take(14).copied().collect();
                if let Some(reason) = triggers::drift_trigger(&recent, config.drift_mape_threshold) {
                    retrain_reasons.push(reason.to_string());
                }
            }
        }
        retrain_reasons.sort();
        retrain_reasons.dedup();

        let mut day_po_counts = empty_po_counts();
        let mut day_promotion_event: Option<PromotionEvent> = None;

        let outcome: std::result::Result<(), ReplayError> = (|| {
            if !retrain_reasons.is_empty() {
                let history_date = day - chrono::Duration::days(1);
                let train_slice: Vec<&ReplayFeatureRow> = sorted_rows.iter().copied().filter(|r| r.date <= history_date).collect();
                if train_slice.is_empty() {
                    return Err(ReplayError::NoTrainingRows { history_date: history_date.to_string() });
                }
                let train_slice = limit_training_rows(&train_slice, config.max_training_rows);
                let (x, y) = design_matrix(&train_slice);

                let mut regressor = new_regressor();
                regressor.fit(&x, &y)?;

                model_seq += 1;
                let version = format!("replay_v{model_seq}");
                models.insert(version.clone(), regressor);
                retrain_count += 1;
                current_version = Some(version.clone());

                trigger_events.push(TriggerEvent {
                    timestamp: config.run_at,
                    date: day,
                    reasons: retrain_reasons.clone(),
                    version,
                    train_end_date: history_date,
                });
            }

            if day_rows.is_empty() {
                return Ok(());
            }

            let version = current_version.clone().expect("a retrain is forced before the first day with rows");
            let regressor = models.get(&version).expect("current_version always names a registered model");

            let x_day: Vec<Vec<f64>> = day_rows.iter().map(|r| r.features.clone()).collect();
            let preds = regressor.predict(&x_day)?.point_estimates();

            let actuals: Vec<ActualSale> = day_rows.iter().map(|r| ActualSale { store_id: r.store_id, product_id: r.product_id, date: r.date, actual_quantity: r.quantity }).collect();
            let forecasts: Vec<ForecastRow> =
                day_rows.iter().zip(preds.iter()).map(|(r, &p)| ForecastRow { store_id: r.store_id, product_id: r.product_id, date: r.date, forecasted_demand: p.max(0.0) }).collect();
            let metric = evaluate_window(&actuals, &forecasts).unwrap_or_default();
            version_metrics.entry(version.clone()).or_default().push(metric);

            if config.po_decisions_per_day > 0 {
                let mut scored: Vec<(usize, f64)> = day_rows.iter().enumerate().map(|(i, r)| (i, (preds[i] - r.quantity).abs())).collect();
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                for &(i, _) in scored.iter().take(config.po_decisions_per_day) {
                    let row = day_rows[i];
                    let suggested_qty = (preds[i].round() as i64).max(1);
                    let decision_key = format!("{day}::{}::{}", row.store_id, row.product_id);
                    let decision = hitl_policy::decide_po_action(preds[i], row.quantity, suggested_qty, &decision_key);
                    *day_po_counts.get_mut(decision.action.as_str()).expect("empty_po_counts seeds every action") += 1;
                    hitl_decisions.push(HitlDecisionRecord {
                        timestamp: config.run_at,
                        decision_type: format!("po_{}", decision.action.as_str()),
                        reason_code: decision.reason_code,
                        impacted_entity_id: format!("{}:{}:{day}", row.store_id, row.product_id),
                        payload: serde_json::json!({
                            "forecast_qty": preds[i],
                            "actual_qty": row.quantity,
                            "final_quantity": decision.final_quantity,
                        }),
                    });
                }
            }

            let days_seen = version_metrics.get(&version).map(Vec::len).unwrap_or(0);
            if !version_decided.contains(&version) && days_seen >= 30 {
                let candidate_summary = thresholds::summarize(version_metrics.get(&version).unwrap(), 0);
                let champion_summary = champion_version.as_ref().and_then(|cv| version_metrics.get(cv)).map(|rows| thresholds::summarize(rows, 0));

                let gate_passed = thresholds::promotion_gate_pass(&candidate_summary, champion_summary.as_ref());
                let decision = hitl_policy::decide_model_promotion(gate_passed, candidate_summary.mape_nonzero, candidate_summary.stockout_miss_rate, &format!("model::{version}"));
                version_decided.insert(version.clone());
                if decision.action == PromotionDecision::Approve {
                    champion_version = Some(version.clone());
                }

                let decision_str = if decision.action == PromotionDecision::Approve { "approve" } else { "reject" };
                day_promotion_event = Some(PromotionEvent {
                    model_version: version.clone(),
                    gate_passed,
                    decision: decision_str.to_string(),
                    reason_code: decision.reason_code.clone(),
                    candidate_summary,
                    champion_version: champion_version.clone(),
                });
                hitl_decisions.push(HitlDecisionRecord {
                    timestamp: config.run_at,
                    decision_type: format!("model_promote_{decision_str}"),
                    reason_code: decision.reason_code,
                    impacted_entity_id: version,
                    payload: serde_json::to_value(day_promotion_event.as_ref().unwrap()).unwrap_or(serde_json::Value::Null),
                });
            }

            Ok(())
        })();

        let model_version = current_version.clone();
        match outcome {
            Ok(()) if day_rows.is_empty() => {
                daily_log.push(DayOutcome {
                    date: day,
                    status: DayStatus::SkippedNoRows,
                    model_version,
                    metrics: None,
                    retrain_triggered: !retrain_reasons.is_empty(),
                    retrain_reasons,
                    po_decision_counts: empty_po_counts(),
                    promotion_event: None,
                    error: None,
                });
            }
            Ok(()) => {
                let version = model_version.clone().unwrap();
                let metric = version_metrics.get(&version).and_then(|rows| rows.last()).copied();
                daily_log.push(DayOutcome {
                    date: day,
                    status: DayStatus::Success,
                    model_version: Some(version),
                    metrics: metric,
                    retrain_triggered: !retrain_reasons.is_empty(),
                    retrain_reasons,
                    po_decision_counts: day_po_counts,
                    promotion_event: day_promotion_event,
                    error: None,
                });
            }
            Err(e) => {
                critical_failures += 1;
                daily_log.push(DayOutcome {
                    date: day,
                    status: DayStatus::Failed,
                    model_version,
                    metrics: None,
                    retrain_triggered: !retrain_reasons.is_empty(),
                    retrain_reasons,
                    po_decision_counts: empty_po_counts(),
                    promotion_event: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let all_metrics: Vec<BacktestWindowResult> = version_metrics.values().flatten().copied().collect();
    let baseline_metrics = thresholds::summarize(&all_metrics, critical_failures);
    let thresholds_cfg = ReplayThresholds::default();
    let (gate_passed, gate_failures) = thresholds::evaluate_baseline_gate(&baseline_metrics, &thresholds_cfg);

    let portfolio = if !gate_passed && config.portfolio_mode == PortfolioMode::Auto {
        Some(evaluate_portfolio(&sorted_rows, train_end_date, config.max_training_rows, config.portfolio_max_eval_rows)?)
    } else {
        None
    };

    Ok(ReplaySummary {
        generated_at: config.run_at,
        replay_days: replay_dates.len(),
        retrain_count,
        critical_failures,
        baseline_metrics,
        gate_passed,
        gate_failures,
        portfolio,
        trigger_events,
        hitl_decisions,
        daily_log,
    })
}

/// Samples `holdout` down to at most `max_rows` by taking every `step`-th
/// row, matching `_sample_holdout_for_portfolio`'s stride sampling (keeps
/// the date spread intact rather than truncating to the earliest rows).
fn sample_holdout(holdout: &[&ReplayFeatureRow], max_rows: usize) -> Vec<ReplayFeatureRow> {
    if max_rows == 0 || holdout.len() <= max_rows {
        return holdout.iter().map(|r| (*r).clone()).collect();
    }
    let step = (holdout.len() / max_rows).max(1);
    holdout.iter().step_by(step).take(max_rows).map(|r| (*r).clone()).collect()
}

/// Weight-sweep fallback when the baseline gate fails, spec.md §4.K step
/// 3. The primary/secondary regressors stand in for the original's
/// xgboost/lstm blend, same as `train::GradientBaselineRegressor` and
/// `train::ExponentialSmoothingRegressor` do everywhere else in this
/// workspace.
fn evaluate_portfolio(sorted_rows: &[&ReplayFeatureRow], train_end_date: NaiveDate, max_training_rows: usize, max_eval_rows: usize) -> Result<PortfolioReport> {
    let train_rows: Vec<&ReplayFeatureRow> = sorted_rows.iter().copied().filter(|r| r.date <= train_end_date).collect();
    let train_rows = limit_training_rows(&train_rows, max_training_rows);
    let (x_train, y_train) = design_matrix(&train_rows);

    let holdout_rows: Vec<&ReplayFeatureRow> = sorted_rows.iter().copied().filter(|r| r.date > train_end_date).collect();
    let eval_rows = sample_holdout(&holdout_rows, max_eval_rows);

    let mut primary = GradientBaselineRegressor::new();
    primary.fit(&x_train, &y_train)?;
    let mut secondary = ExponentialSmoothingRegressor::default();
    secondary.fit(&x_train, &y_train)?;

    let x_eval: Vec<Vec<f64>> = eval_rows.iter().map(|r| r.features.clone()).collect();
    let primary_preds = primary.predict(&x_eval)?.point_estimates();
    let secondary_preds = secondary.predict(&x_eval)?.point_estimates();

    let actuals: Vec<ActualSale> = eval_rows.iter().map(|r| ActualSale { store_id: r.store_id, product_id: r.product_id, date: r.date, actual_quantity: r.quantity }).collect();

    let mut candidates = Vec::new();
    for &primary_weight in &[1.0, 0.9, 0.8, 0.65] {
        let secondary_weight = ((1.0 - primary_weight) * 100.0).round() / 100.0;

        let forecasts: Vec<ForecastRow> = eval_rows
            .iter()
            .zip(primary_preds.iter())
            .zip(secondary_preds.iter())
            .map(|((r, &p), &s)| ForecastRow { store_id: r.store_id, product_id: r.product_id, date: r.date, forecasted_demand: (primary_weight * p + secondary_weight * s).max(0.0) })
            .collect();

        let metrics = evaluate_window(&actuals, &forecasts).unwrap_or_default();
        candidates.push(PortfolioCandidate { primary_weight, secondary_weight, metrics });
    }

    let recommended = candidates
        .iter()
        .min_by(|a, b| (a.metrics.mape, a.metrics.mae).partial_cmp(&(b.metrics.mape, b.metrics.mae)).unwrap_or(std::cmp::Ordering::Equal))
        .cloned()
        .ok_or_else(|| ReplayError::NoReplayDates)?;

    Ok(PortfolioReport { evaluated_rows: eval_rows.len(), candidates, recommended })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(y: i32, m: u32, d: u32, store: Uuid, product: Uuid, qty: f64) -> ReplayFeatureRow {
        ReplayFeatureRow { date: NaiveDate::from_ymd_opt(y, m, d).unwrap(), store_id: store, product_id: product, features: vec![qty / 2.0], quantity: qty }
    }

    fn dataset() -> (Vec<ReplayFeatureRow>, NaiveDate) {
        let store = Uuid::new_v4();
        let product = Uuid::new_v4();
        let mut rows = Vec::new();
        for day in 1..=20 {
            rows.push(row(2024, 1, day, store, product, 10.0 + day as f64));
        }
        let train_end_date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        (rows, train_end_date)
    }

    #[test]
    fn empty_dataset_reports_empty_holdout() {
        let config = ReplayConfig { run_at: Utc::now(), ..ReplayConfig::default() };
        let err = run_replay(&[], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), &config, GradientBaselineRegressor::new).unwrap_err();
        assert!(matches!(err, ReplayError::EmptyHoldout { .. }));
    }

    #[test]
    fn first_holdout_day_always_retrains_with_reason_initial() {
        let (rows, train_end_date) = dataset();
        let config = ReplayConfig { run_at: Utc::now(), po_decisions_per_day: 0, retrain_cadence: RetrainCadence::None, ..ReplayConfig::default() };
        let summary = run_replay(&rows, train_end_date, &config, GradientBaselineRegressor::new).unwrap();
        assert_eq!(summary.daily_log[0].retrain_reasons, vec!["initial".to_string()]);
        assert_eq!(summary.retrain_count, 1);
    }

    #[test]
    fn two_runs_with_identical_input_produce_identical_summaries() {
        let (rows, train_end_date) = dataset();
        let run_at = Utc::now();
        let config = ReplayConfig { run_at, po_decisions_per_day: 1, retrain_cadence: RetrainCadence::Daily, ..ReplayConfig::default() };
        let first = run_replay(&rows, train_end_date, &config, GradientBaselineRegressor::new).unwrap();
        let second = run_replay(&rows, train_end_date, &config, GradientBaselineRegressor::new).unwrap();
        assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());
    }

    #[test]
    fn daily_cadence_retrains_every_day() {
        let (rows, train_end_date) = dataset();
        let config = ReplayConfig { run_at: Utc::now(), retrain_cadence: RetrainCadence::Daily, po_decisions_per_day: 0, ..ReplayConfig::default() };
        let summary = run_replay(&rows, train_end_date, &config, GradientBaselineRegressor::new).unwrap();
        assert_eq!(summary.retrain_count as usize, summary.replay_days);
    }
}
