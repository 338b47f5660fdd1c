//! Deterministic replay simulator, spec.md §4.K. Partitions a historical
//! dataset into train/holdout (`partition`), replays the holdout day by
//! day against a retrained-on-schedule model (`simulator`), and uses a
//! seeded decision policy (`hitl_policy`) plus fixed gates (`thresholds`)
//! to stand in for the human reviewers and promotion committee the live
//! system would otherwise use.

pub mod error;
pub mod hitl_policy;
pub mod partition;
pub mod simulator;
pub mod thresholds;
pub mod triggers;

pub use error::{ReplayError, Result};
pub use simulator::{run_replay, ReplayConfig, ReplayFeatureRow, ReplaySummary};
