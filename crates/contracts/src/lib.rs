//! Canonical transaction contract: normalizes heterogeneous dataset layouts
//! into one schema (spec.md §4.B) and scores the result for onboarding.

pub mod config;
pub mod dq;
pub mod error;
pub mod model;
pub mod normalize;

pub use config::ContractConfig;
pub use dq::{score_batch, DataQualityReport};
pub use error::{ContractError, Result};
pub use model::{
    CanonicalRecord, DatasetKind, ProductGrain, RawRow, CANONICAL_BASE_COLS, CANONICAL_REQUIRED_COLS,
};
pub use normalize::normalize;
