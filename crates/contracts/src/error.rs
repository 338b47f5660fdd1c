use thiserror::Error;

/// Errors raised while normalizing a raw batch into the canonical
/// transaction contract (spec.md §4.B).
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("missing required canonical column(s): {0:?}")]
    ContractMissingField(Vec<String>),

    #[error("data quality gate failed: {0}")]
    DataQualityGateFailed(String),

    #[error("unrecognized dataset layout in {0}")]
    UnrecognizedDataset(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("core system error: {0}")]
    Core(#[from] shelfops_core::Error),
}

pub type Result<T> = std::result::Result<T, ContractError>;
