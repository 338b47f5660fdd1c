//! Demand-forecasting lifecycle: feature engineering, model arena,
//! training/backtest, and forecast runtime (spec.md §4.D-§4.G).

pub mod arena;
pub mod backtest;
pub mod error;
pub mod features;
pub mod runtime;
pub mod train;

pub use arena::{ModelStatus, ModelVersion, Registry, RoutingStrategy};
pub use error::{ForecastingError, Result};
pub use features::{ColdStartRow, FeatureTier, ProductionRow};
pub use train::{ModelArtifact, PredictionOutput, Regressor};
