use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastingError {
    #[error("feature engineering error: {0}")]
    Features(String),

    #[error("no champion or explicit model version available for ({model_name})")]
    NoActiveVersion { model_name: String },

    #[error("model artifact error: {0}")]
    Artifact(String),

    #[error("contract error: {0}")]
    Contract(#[from] shelfops_contracts::ContractError),

    #[error("core system error: {0}")]
    Core(#[from] shelfops_core::Error),
}

pub type Result<T> = std::result::Result<T, ForecastingError>;
