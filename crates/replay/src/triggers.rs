//! Retrain triggers for the replay simulator, spec.md §4.K step 2.
//! Grounded on `run_replay_simulation.py`'s inline retrain-reason checks
//! in `main()` (`scheduled_daily`/`scheduled_weekly`/`drift_detected`);
//! the "initial" reason is handled by the caller, since it depends on
//! whether a model has been trained yet rather than on cadence alone.

use serde::{Deserialize, Serialize};
use shelfops_forecasting::backtest::{rolling_mape, BacktestWindowResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainCadence {
    Daily,
    Weekly,
    None,
}

/// `day_index` is the 0-based position within the replay window. Weekly
/// cadence skips day 0 (already covered by the "initial" reason) and
/// fires every 7th day after that.
pub fn scheduled_trigger(cadence: RetrainCadence, day_index: usize) -> Option<&'static str> {
    match cadence {
        RetrainCadence::Daily => Some("scheduled_daily"),
        RetrainCadence::Weekly if day_index > 0 && day_index % 7 == 0 => Some("scheduled_weekly"),
        RetrainCadence::Weekly | RetrainCadence::None => None,
    }
}

/// Rolling-14-day MAPE on the active version exceeding `threshold`
/// (percentage scale, matching `backtest::BacktestWindowResult::mape`).
pub fn drift_trigger(recent_windows: &[BacktestWindowResult], threshold: f64) -> Option<&'static str> {
    if recent_windows.is_empty() {
        return None;
    }
    if rolling_mape(recent_windows) > threshold {
        Some("drift_detected")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(mape: f64) -> BacktestWindowResult {
        BacktestWindowResult { mae: 0.0, mape, stockout_miss_rate: 0.0, overstock_rate: 0.0, samples: 1 }
    }

    #[test]
    fn weekly_cadence_skips_day_zero() {
        assert_eq!(scheduled_trigger(RetrainCadence::Weekly, 0), None);
        assert_eq!(scheduled_trigger(RetrainCadence::Weekly, 7), Some("scheduled_weekly"));
        assert_eq!(scheduled_trigger(RetrainCadence::Weekly, 8), None);
    }

    #[test]
    fn daily_cadence_always_fires() {
        assert_eq!(scheduled_trigger(RetrainCadence::Daily, 0), Some("scheduled_daily"));
        assert_eq!(scheduled_trigger(RetrainCadence::Daily, 3), Some("scheduled_daily"));
    }

    #[test]
    fn drift_fires_only_above_threshold() {
        let windows = vec![window(10.0), window(12.0)];
        assert_eq!(drift_trigger(&windows, 28.0), None);
        let windows = vec![window(30.0), window(32.0)];
        assert_eq!(drift_trigger(&windows, 28.0), Some("drift_detected"));
    }

    #[test]
    fn drift_is_silent_with_no_history() {
        assert_eq!(drift_trigger(&[], 28.0), None);
    }
}
