use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("no cadence entry registered for task {0}")]
    UnknownTask(&'static str),

    #[error("core system error: {0}")]
    Core(#[from] shelfops_core::Error),

    #[error("ingestion error: {0}")]
    Ingestion(#[from] shelfops_ingestion::IngestionError),

    #[error("forecasting error: {0}")]
    Forecasting(#[from] shelfops_forecasting::error::ForecastingError),

    #[error("alerts error: {0}")]
    Alerts(#[from] shelfops_alerts::AlertsError),

    #[error("master data error: {0}")]
    MasterData(#[from] shelfops_master_data::error::MasterDataError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
