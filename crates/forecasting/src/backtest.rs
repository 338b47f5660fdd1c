//! Walk-forward backtesting, spec.md §4.F. Grounded on
//! `examples/original_source/backend/ml/backtest.py`: `run_continuous_backtest`
//! becomes `walk_forward`, `backtest_yesterday` becomes `backtest_t_minus_1`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct ActualSale {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub date: NaiveDate,
    pub actual_quantity: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ForecastRow {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub date: NaiveDate,
    pub forecasted_demand: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestWindowResult {
    pub mae: f64,
    pub mape: f64,
    pub stockout_miss_rate: f64,
    pub overstock_rate: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct BacktestParams {
    pub window_size_days: i64,
    pub step_size_days: i64,
    pub lookback_days: i64,
}

impl BacktestParams {
    pub const WALK_FORWARD: Self = Self { window_size_days: 30, step_size_days: 7, lookback_days: 90 };
    /// T-1 daily validation, spec.md §4.F: "window=1, step=1, lookback=1".
    pub const T_MINUS_1: Self = Self { window_size_days: 1, step_size_days: 1, lookback_days: 1 };
}

/// Compares actuals to forecasts for one window, spec.md §4.F's metric
/// definitions. `actuals`/`forecasts` are expected pre-filtered to the
/// window; join is by (store, product, date).
pub fn evaluate_window(actuals: &[ActualSale], forecasts: &[ForecastRow]) -> Option<BacktestWindowResult> {
    use std::collections::HashMap;

    let forecast_index: HashMap<(Uuid, Uuid, NaiveDate), f64> =
        forecasts.iter().map(|f| ((f.store_id, f.product_id, f.date), f.forecasted_demand)).collect();

    let joined: Vec<(f64, f64)> = actuals
        .iter()
        .filter_map(|a| forecast_index.get(&(a.store_id, a.product_id, a.date)).map(|&f| (f, a.actual_quantity)))
        .collect();

    if joined.is_empty() {
        return None;
    }

    let abs_errors: Vec<f64> = joined.iter().map(|(f, a)| (f - a).abs()).collect();
    let mae = abs_errors.iter().sum::<f64>() / abs_errors.len() as f64;

    let nonzero: Vec<(f64, f64)> = joined.iter().copied().filter(|(_, a)| *a > 0.0).collect();
    let mape = if nonzero.is_empty() {
        0.0
    } else {
        nonzero.iter().map(|(f, a)| ((f - a).abs() / a) * 100.0).sum::<f64>() / nonzero.len() as f64
    };

    let stockouts: Vec<(f64, f64)> = joined.iter().copied().filter(|(_, a)| *a == 0.0).collect();
    let stockout_miss_rate = if stockouts.is_empty() {
        0.0
    } else {
        stockouts.iter().filter(|(f, _)| *f > 0.0).count() as f64 / stockouts.len() as f64
    };

    let overstock_count = joined.iter().filter(|(f, a)| *f > a * 2.0).count();
    let overstock_rate = overstock_count as f64 / joined.len() as f64;

    Some(BacktestWindowResult { mae, mape, stockout_miss_rate, overstock_rate, samples: joined.len() })
}

#[derive(Debug, Clone)]
pub struct WalkForwardSummary {
    pub windows_tested: usize,
    pub avg_mae: f64,
    pub avg_mape: f64,
    pub results: Vec<(NaiveDate, NaiveDate, BacktestWindowResult)>,
}

/// Walks `today - lookback_days .. today` in `step_size_days` increments,
/// scoring each `window_size_days`-wide window. Windows with no matching
/// actual/forecast rows are skipped (not zero-filled), matching
/// `run_continuous_backtest`'s `continue` on an empty join.
pub fn walk_forward(
    today: NaiveDate,
    params: BacktestParams,
    actuals_for_window: impl Fn(NaiveDate, NaiveDate) -> Vec<ActualSale>,
    forecasts_for_window: impl Fn(NaiveDate, NaiveDate) -> Vec<ForecastRow>,
) -> WalkForwardSummary {
    let start_date = today - chrono::Duration::days(params.lookback_days);
    let mut results = Vec::new();
    let mut current = start_date;

    while current + chrono::Duration::days(params.window_size_days) <= today {
        let window_end = current + chrono::Duration::days(params.window_size_days);
        let actuals = actuals_for_window(current, window_end);
        let forecasts = forecasts_for_window(current, window_end);

        if let Some(result) = evaluate_window(&actuals, &forecasts) {
            results.push((current, window_end, result));
        }

        current += chrono::Duration::days(params.step_size_days);
    }

    let windows_tested = results.len();
    let (avg_mae, avg_mape) = if windows_tested == 0 {
        (0.0, 0.0)
    } else {
        (
            results.iter().map(|(_, _, r)| r.mae).sum::<f64>() / windows_tested as f64,
            results.iter().map(|(_, _, r)| r.mape).sum::<f64>() / windows_tested as f64,
        )
    };

    WalkForwardSummary { windows_tested, avg_mae, avg_mape, results }
}

/// T-1 validation: "did yesterday's forecasts work?", spec.md §4.F.
pub fn backtest_t_minus_1(
    today: NaiveDate,
    actuals_for_window: impl Fn(NaiveDate, NaiveDate) -> Vec<ActualSale>,
    forecasts_for_window: impl Fn(NaiveDate, NaiveDate) -> Vec<ForecastRow>,
) -> Option<BacktestWindowResult> {
    let summary = walk_forward(today, BacktestParams::T_MINUS_1, actuals_for_window, forecasts_for_window);
    summary.results.into_iter().next().map(|(_, _, r)| r)
}

/// Rolling-14-day MAPE on the active version, used by the replay
/// simulator's drift retrain trigger (spec.md §4.K).
pub fn rolling_mape(recent_windows: &[BacktestWindowResult]) -> f64 {
    if recent_windows.is_empty() {
        return 0.0;
    }
    recent_windows.iter().map(|r| r.mape).sum::<f64>() / recent_windows.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn mae_and_mape_match_direct_computation() {
        let store = Uuid::new_v4();
        let product = Uuid::new_v4();
        let d = date(2024, 1, 1);
        let actuals = vec![ActualSale { store_id: store, product_id: product, date: d, actual_quantity: 10.0 }];
        let forecasts = vec![ForecastRow { store_id: store, product_id: product, date: d, forecasted_demand: 12.0 }];

        let result = evaluate_window(&actuals, &forecasts).unwrap();
        assert_eq!(result.mae, 2.0);
        assert!((result.mape - 20.0).abs() < 1e-9);
    }

    #[test]
    fn stockout_miss_rate_counts_nonzero_forecasts_on_zero_actuals() {
        let store = Uuid::new_v4();
        let product = Uuid::new_v4();
        let d = date(2024, 1, 1);
        let actuals = vec![ActualSale { store_id: store, product_id: product, date: d, actual_quantity: 0.0 }];
        let forecasts = vec![ForecastRow { store_id: store, product_id: product, date: d, forecasted_demand: 5.0 }];

        let result = evaluate_window(&actuals, &forecasts).unwrap();
        assert_eq!(result.stockout_miss_rate, 1.0);
    }

    #[test]
    fn unmatched_rows_return_none() {
        let actuals = vec![ActualSale { store_id: Uuid::new_v4(), product_id: Uuid::new_v4(), date: date(2024, 1, 1), actual_quantity: 5.0 }];
        let forecasts = vec![];
        assert!(evaluate_window(&actuals, &forecasts).is_none());
    }

    #[test]
    fn walk_forward_skips_empty_windows() {
        let today = date(2024, 4, 1);
        let summary = walk_forward(today, BacktestParams::T_MINUS_1, |_, _| vec![], |_, _| vec![]);
        assert_eq!(summary.windows_tested, 0);
        assert_eq!(summary.avg_mae, 0.0);
    }
}
