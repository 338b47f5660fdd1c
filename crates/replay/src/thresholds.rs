//! Baseline and promotion gates for the replay simulator, spec.md §4.K
//! step 3. Grounded on `run_replay_simulation.py`'s `ReplayThresholds`,
//! `_evaluate_baseline_gate`, `_promotion_gate_pass`, and `_weighted_metric`.
//!
//! Scale convention: `mape_nonzero_max`/`mape_nonzero` here are on the same
//! percentage scale (0-100) as `shelfops_forecasting::backtest`'s `mape`
//! field, not the 0-1 fraction the Python original uses for its own
//! `mape_nonzero`. `stockout_miss_rate`/`overstock_rate` stay fractions in
//! both, since `backtest::evaluate_window` already produces them that way.

use serde::{Deserialize, Serialize};
use shelfops_forecasting::backtest::BacktestWindowResult;

#[derive(Debug, Clone, Copy)]
pub struct ReplayThresholds {
    pub mape_nonzero_max: f64,
    pub stockout_miss_rate_max: f64,
    pub overstock_rate_max: f64,
}

impl Default for ReplayThresholds {
    fn default() -> Self {
        Self { mape_nonzero_max: 22.0, stockout_miss_rate_max: 0.08, overstock_rate_max: 0.55 }
    }
}

/// Sample-weighted summary across a run's daily metric rows, spec.md
/// §4.K: each day contributes in proportion to `samples`, not as an
/// unweighted per-day average.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub mae: f64,
    pub mape_nonzero: f64,
    pub stockout_miss_rate: f64,
    pub overstock_rate: f64,
    pub critical_failures: u64,
}

fn weighted(rows: &[BacktestWindowResult], pick: impl Fn(&BacktestWindowResult) -> f64) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for row in rows {
        let samples = row.samples as f64;
        num += pick(row) * samples;
        den += samples;
    }
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

pub fn summarize(rows: &[BacktestWindowResult], critical_failures: u64) -> SummaryMetrics {
    SummaryMetrics {
        mae: weighted(rows, |r| r.mae),
        mape_nonzero: weighted(rows, |r| r.mape),
        stockout_miss_rate: weighted(rows, |r| r.stockout_miss_rate),
        overstock_rate: weighted(rows, |r| r.overstock_rate),
        critical_failures,
    }
}

/// spec.md §4.K step 3: "pass/fail a baseline gate against fixed
/// thresholds". Returns the gate outcome plus which checks failed.
pub fn evaluate_baseline_gate(summary: &SummaryMetrics, thresholds: &ReplayThresholds) -> (bool, Vec<String>) {
    let mut failures = Vec::new();
    if summary.mape_nonzero > thresholds.mape_nonzero_max {
        failures.push("mape_nonzero".to_string());
    }
    if summary.stockout_miss_rate > thresholds.stockout_miss_rate_max {
        failures.push("stockout_miss_rate".to_string());
    }
    if summary.overstock_rate > thresholds.overstock_rate_max {
        failures.push("overstock_rate".to_string());
    }
    if summary.critical_failures > 0 {
        failures.push("critical_failures".to_string());
    }
    (failures.is_empty(), failures)
}

/// Candidate non-regression gate for model promotion, spec.md §4.K step 2.
/// No champion yet always passes (first version onboards unconditionally).
pub fn promotion_gate_pass(candidate: &SummaryMetrics, champion: Option<&SummaryMetrics>) -> bool {
    let Some(champion) = champion else {
        return true;
    };
    let mae_ok = candidate.mae <= champion.mae * 1.02;
    let mape_ok = candidate.mape_nonzero <= champion.mape_nonzero * 1.02;
    let stockout_ok = candidate.stockout_miss_rate <= champion.stockout_miss_rate + 0.005;
    let overstock_ok = candidate.overstock_rate <= champion.overstock_rate + 0.005;
    mae_ok && mape_ok && stockout_ok && overstock_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(mae: f64, mape: f64, stockout: f64, overstock: f64, samples: usize) -> BacktestWindowResult {
        BacktestWindowResult { mae, mape, stockout_miss_rate: stockout, overstock_rate: overstock, samples }
    }

    #[test]
    fn summarize_weights_by_sample_count() {
        let rows = vec![window(10.0, 20.0, 0.0, 0.0, 10), window(20.0, 40.0, 0.0, 0.0, 90)];
        let summary = summarize(&rows, 0);
        // (10*10 + 20*90) / 100 = 19.0
        assert!((summary.mae - 19.0).abs() < 1e-9);
    }

    #[test]
    fn baseline_gate_flags_every_breached_threshold() {
        let thresholds = ReplayThresholds::default();
        let summary = SummaryMetrics { mae: 1.0, mape_nonzero: 30.0, stockout_miss_rate: 0.5, overstock_rate: 0.9, critical_failures: 1 };
        let (passed, failures) = evaluate_baseline_gate(&summary, &thresholds);
        assert!(!passed);
        assert_eq!(failures.len(), 4);
    }

    #[test]
    fn promotion_gate_allows_small_regression_within_tolerance() {
        let champion = SummaryMetrics { mae: 10.0, mape_nonzero: 20.0, stockout_miss_rate: 0.05, overstock_rate: 0.1, critical_failures: 0 };
        let candidate = SummaryMetrics { mae: 10.1, mape_nonzero: 20.3, stockout_miss_rate: 0.054, overstock_rate: 0.104, critical_failures: 0 };
        assert!(promotion_gate_pass(&candidate, Some(&champion)));
    }

    #[test]
    fn promotion_gate_rejects_regression_beyond_tolerance() {
        let champion = SummaryMetrics { mae: 10.0, mape_nonzero: 20.0, stockout_miss_rate: 0.05, overstock_rate: 0.1, critical_failures: 0 };
        let candidate = SummaryMetrics { mae: 12.0, mape_nonzero: 20.3, stockout_miss_rate: 0.054, overstock_rate: 0.104, critical_failures: 0 };
        assert!(!promotion_gate_pass(&candidate, Some(&champion)));
    }
}
