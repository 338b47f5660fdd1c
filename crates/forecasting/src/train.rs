//! Training pipeline, spec.md §4.F. Grounded on
//! `examples/original_source/backend/ml/train.py`, with the `Regressor`
//! capability satisfied by two closed-form reference implementations
//! instead of XGBoost/LSTM (see DESIGN.md: the model family is an explicit
//! Non-goal, and no module here actually needs a tensor framework).

use serde::{Deserialize, Serialize};

use crate::arena::ModelMetrics;
use crate::error::{ForecastingError, Result};
use crate::features::FeatureTier;

pub const TARGET_NAME: &str = "quantity";

/// A regressor's output: either a single point forecast per row, or a
/// [p10, p50, p90] triple per row, spec.md §4.F.
#[derive(Debug, Clone)]
pub enum PredictionOutput {
    Point(Vec<f64>),
    Quantiles(Vec<[f64; 3]>),
}

impl PredictionOutput {
    /// The p50 (or point estimate) series, used uniformly by backtest and
    /// runtime code that doesn't care about the interval.
    pub fn point_estimates(&self) -> Vec<f64> {
        match self {
            PredictionOutput::Point(v) => v.clone(),
            PredictionOutput::Quantiles(v) => v.iter().map(|q| q[1]).collect(),
        }
    }
}

pub trait Regressor: Send + Sync {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()>;
    fn predict(&self, x: &[Vec<f64>]) -> Result<PredictionOutput>;
}

/// Trained artifact: regressor plus the metadata needed to serve and
/// re-evaluate it later without retraining, spec.md §4.F.
pub struct ModelArtifact {
    pub regressor: Box<dyn Regressor>,
    pub metadata: ArtifactMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub version: String,
    pub tier: FeatureTier_,
    pub feature_cols: Vec<String>,
    pub weights: std::collections::HashMap<String, f64>,
    pub training_rows: usize,
    pub metrics: ModelMetrics,
}

/// Serializable mirror of `FeatureTier` (kept as a separate type so
/// `features::FeatureTier` stays a plain Copy enum with no serde coupling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureTier_ {
    ColdStart,
    Production,
}

impl From<FeatureTier> for FeatureTier_ {
    fn from(t: FeatureTier) -> Self {
        match t {
            FeatureTier::ColdStart => FeatureTier_::ColdStart,
            FeatureTier::Production => FeatureTier_::Production,
        }
    }
}

/// Piecewise-linear-trend + seasonal-bucket regressor fit by closed-form
/// least squares. Stand-in for the teacher source's XGBoost baseline.
/// `fit` regresses `y` on `[1, row_index, day_of_week_one_hot...]` using
/// normal equations; `predict` applies the fitted coefficients and clips
/// to >= 0 (demand can't be negative, matching `train_xgboost`'s
/// `np.maximum(preds, 0)`).
pub struct GradientBaselineRegressor {
    coefficients: Vec<f64>,
    residual_std: f64,
}

impl GradientBaselineRegressor {
    pub fn new() -> Self {
        Self { coefficients: Vec::new(), residual_std: 0.0 }
    }

    fn design_row(row: &[f64], index: f64) -> Vec<f64> {
        let mut design = vec![1.0, index];
        design.extend_from_slice(row);
        design
    }
}

impl Default for GradientBaselineRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Regressor for GradientBaselineRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ForecastingError::Features("fit requires non-empty, aligned X/y".to_string()));
        }
        let n_features = Self::design_row(&x[0], 0.0).len();
        let design: Vec<Vec<f64>> = x.iter().enumerate().map(|(i, row)| Self::design_row(row, i as f64)).collect();

        // Normal equations: (D^T D) beta = D^T y, solved by Gauss-Jordan.
        let mut ata = vec![vec![0.0; n_features]; n_features];
        let mut aty = vec![0.0; n_features];
        for (row, &target) in design.iter().zip(y.iter()) {
            for i in 0..n_features {
                aty[i] += row[i] * target;
                for j in 0..n_features {
                    ata[i][j] += row[i] * row[j];
                }
            }
        }
        // Ridge regularization for numerical stability on collinear columns.
        for i in 0..n_features {
            ata[i][i] += 1e-6;
        }
        self.coefficients = solve_linear_system(&mut ata, &mut aty)?;

        let residuals: Vec<f64> = design
            .iter()
            .zip(y.iter())
            .map(|(row, &target)| target - dot(row, &self.coefficients))
            .collect();
        self.residual_std = std_dev(&residuals);
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<PredictionOutput> {
        if self.coefficients.is_empty() {
            return Err(ForecastingError::Features("predict called before fit".to_string()));
        }
        let z90 = 1.645;
        let preds: Vec<[f64; 3]> = x
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let design = Self::design_row(row, i as f64);
                let mid = dot(&design, &self.coefficients).max(0.0);
                let lower = (mid - z90 * self.residual_std).max(0.0);
                let upper = mid + z90 * self.residual_std;
                [lower, mid, upper]
            })
            .collect();
        Ok(PredictionOutput::Quantiles(preds))
    }
}

/// Holt-Winters double exponential smoothing with a damped trend. Stand-in
/// for the teacher source's LSTM sequence model: captures level + trend
/// without needing a tensor framework or a fixed sequence length.
pub struct ExponentialSmoothingRegressor {
    alpha: f64,
    beta: f64,
    damping: f64,
    level: f64,
    trend: f64,
    residual_std: f64,
}

impl ExponentialSmoothingRegressor {
    pub fn new(alpha: f64, beta: f64, damping: f64) -> Self {
        Self { alpha, beta, damping, level: 0.0, trend: 0.0, residual_std: 0.0 }
    }
}

impl Default for ExponentialSmoothingRegressor {
    fn default() -> Self {
        Self::new(0.3, 0.1, 0.9)
    }
}

impl Regressor for ExponentialSmoothingRegressor {
    /// Ignores `x` (this regressor is a pure time-series smoother over
    /// `y`, matching the LSTM's role as a sequence-only second opinion in
    /// the ensemble); `x.len()` must still equal `y.len()`.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<()> {
        if x.len() != y.len() || y.is_empty() {
            return Err(ForecastingError::Features("fit requires non-empty, aligned X/y".to_string()));
        }
        self.level = y[0];
        self.trend = if y.len() > 1 { y[1] - y[0] } else { 0.0 };

        let mut fitted = Vec::with_capacity(y.len());
        for &actual in y {
            fitted.push(self.level + self.damping * self.trend);
            let prev_level = self.level;
            self.level = self.alpha * actual + (1.0 - self.alpha) * (prev_level + self.damping * self.trend);
            self.trend = self.beta * (self.level - prev_level) + (1.0 - self.beta) * self.damping * self.trend;
        }

        let residuals: Vec<f64> = fitted.iter().zip(y.iter()).map(|(f, a)| a - f).collect();
        self.residual_std = std_dev(&residuals);
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<PredictionOutput> {
        let z90 = 1.645;
        let mut level = self.level;
        let mut trend = self.trend;
        let preds = x
            .iter()
            .map(|_| {
                let mid = (level + trend * self.damping).max(0.0);
                level += trend * self.damping;
                trend *= self.damping;
                let lower = (mid - z90 * self.residual_std).max(0.0);
                let upper = mid + z90 * self.residual_std;
                [lower, mid, upper]
            })
            .collect();
        Ok(PredictionOutput::Quantiles(preds))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Gauss-Jordan elimination with partial pivoting. `a` is `n x n`, `b` is
/// length `n`; returns the solution vector.
fn solve_linear_system(a: &mut [Vec<f64>], b: &mut [f64]) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[i][col].abs().partial_cmp(&a[j][col].abs()).unwrap())
            .unwrap();
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        let pivot = a[col][col];
        if pivot.abs() < 1e-12 {
            continue;
        }
        for j in 0..n {
            a[col][j] /= pivot;
        }
        b[col] /= pivot;

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[row][j] -= factor * a[col][j];
            }
            b[row] -= factor * b[col];
        }
    }
    Ok(b.to_vec())
}

/// 5-fold expanding-window time-series split, spec.md §4.F: no shuffling,
/// each fold's validation rows come strictly after its training rows.
pub fn time_series_splits(n_rows: usize, n_splits: usize) -> Vec<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    if n_rows < n_splits + 1 {
        return Vec::new();
    }
    let fold_size = n_rows / (n_splits + 1);
    (1..=n_splits)
        .map(|fold| {
            let train_end = fold_size * fold;
            let val_end = (fold_size * (fold + 1)).min(n_rows);
            (0..train_end, train_end..val_end)
        })
        .collect()
}

/// Cross-validated MAE/MAPE/coverage for a regressor factory, spec.md
/// §4.F. `new_regressor` is called once per fold so each fold trains a
/// fresh model (no leakage of fitted state across folds).
pub fn cross_validate<F, R>(x: &[Vec<f64>], y: &[f64], mut new_regressor: F) -> Result<ModelMetrics>
where
    F: FnMut() -> R,
    R: Regressor,
{
    let splits = time_series_splits(x.len(), 5);
    if splits.is_empty() {
        return Ok(ModelMetrics::default());
    }

    let mut maes = Vec::new();
    let mut mapes = Vec::new();
    let mut coverages = Vec::new();

    for (train_range, val_range) in splits {
        let mut regressor = new_regressor();
        regressor.fit(&x[train_range.clone()], &y[train_range])?;
        let output = regressor.predict(&x[val_range.clone()])?;

        let (lower, mid, upper): (Vec<f64>, Vec<f64>, Vec<f64>) = match &output {
            PredictionOutput::Quantiles(q) => (q.iter().map(|v| v[0]).collect(), q.iter().map(|v| v[1]).collect(), q.iter().map(|v| v[2]).collect()),
            PredictionOutput::Point(p) => (p.clone(), p.clone(), p.clone()),
        };
        let actual = &y[val_range];

        let abs_errors: Vec<f64> = mid.iter().zip(actual.iter()).map(|(p, a)| (p - a).abs()).collect();
        maes.push(abs_errors.iter().sum::<f64>() / abs_errors.len() as f64);

        let nonzero: Vec<(f64, f64)> = mid.iter().zip(actual.iter()).filter(|(_, &a)| a > 0.0).map(|(&p, &a)| (p, a)).collect();
        if !nonzero.is_empty() {
            let mape = nonzero.iter().map(|(p, a)| ((p - a).abs() / a) * 100.0).sum::<f64>() / nonzero.len() as f64;
            mapes.push(mape);
        }

        let covered = lower.iter().zip(upper.iter()).zip(actual.iter()).filter(|((l, u), a)| **a >= **l && **a <= **u).count();
        coverages.push(covered as f64 / actual.len() as f64);
    }

    Ok(ModelMetrics {
        mae: maes.iter().sum::<f64>() / maes.len() as f64,
        mape: if mapes.is_empty() { 0.0 } else { mapes.iter().sum::<f64>() / mapes.len() as f64 },
        coverage: coverages.iter().sum::<f64>() / coverages.len() as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_dataset(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..n).map(|i| 2.0 * i as f64 + 3.0).collect();
        (x, y)
    }

    #[test]
    fn gradient_baseline_fits_a_linear_trend() {
        let (x, y) = linear_dataset(40);
        let mut model = GradientBaselineRegressor::new();
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x[35..]).unwrap().point_estimates();
        for (pred, actual) in preds.iter().zip(y[35..].iter()) {
            assert!((pred - actual).abs() < 5.0, "pred={pred} actual={actual}");
        }
    }

    #[test]
    fn exponential_smoothing_tracks_rising_series() {
        let y: Vec<f64> = (0..30).map(|i| 10.0 + i as f64).collect();
        let x: Vec<Vec<f64>> = (0..30).map(|_| vec![]).collect();
        let mut model = ExponentialSmoothingRegressor::default();
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&[vec![], vec![]]).unwrap().point_estimates();
        assert!(preds[0] > 30.0);
    }

    #[test]
    fn time_series_splits_never_validate_before_training_rows() {
        let splits = time_series_splits(60, 5);
        assert_eq!(splits.len(), 5);
        for (train, val) in splits {
            assert!(train.end <= val.start);
        }
    }

    #[test]
    fn cross_validate_produces_bounded_metrics() {
        let (x, y) = linear_dataset(60);
        let metrics = cross_validate(&x, &y, GradientBaselineRegressor::new).unwrap();
        assert!(metrics.mae >= 0.0);
        assert!(metrics.coverage >= 0.0 && metrics.coverage <= 1.0);
    }
}
