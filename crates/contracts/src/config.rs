//! Onboarding thresholds for the data-quality gate (spec.md §4.B),
//! layered the way `shelfops_core::config::Settings` loads its sections:
//! a `config/contracts.toml` default overlaid by environment variables
//! prefixed `CONTRACTS_`.

use config::{ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ContractConfig {
    /// Fraction of rows sharing a `(date, store_id, product_id)` key beyond
    /// the first that is tolerated before onboarding is rejected.
    pub max_duplicate_rate: f64,
    /// Fraction of rows with a missing `store_id`/`product_id` tolerated.
    pub max_null_rate: f64,
    /// Minimum observed history span, in days, required to onboard a
    /// dataset for training (cold-start tier uses the smaller of the two
    /// training-config minimums; this is the contract-layer floor).
    pub min_history_days: u32,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            max_duplicate_rate: 0.02,
            max_null_rate: 0.01,
            min_history_days: 14,
        }
    }
}

impl ContractConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(File::with_name("config/contracts").required(false))
            .add_source(Environment::with_prefix("CONTRACTS"));

        let built = builder.build()?;
        match built.try_deserialize::<Self>() {
            Ok(cfg) => Ok(cfg),
            Err(_) => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_are_sane() {
        let cfg = ContractConfig::default();
        assert!(cfg.max_duplicate_rate > 0.0 && cfg.max_duplicate_rate < 1.0);
        assert!(cfg.max_null_rate > 0.0 && cfg.max_null_rate < 1.0);
        assert!(cfg.min_history_days > 0);
    }
}
