use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("holdout partition is empty for train_end_date {train_end_date}")]
    EmptyHoldout { train_end_date: String },

    #[error("no replay dates available after start/end filters")]
    NoReplayDates,

    #[error("no training rows available for history date {history_date}")]
    NoTrainingRows { history_date: String },

    #[error("forecasting error: {0}")]
    Forecasting(#[from] shelfops_forecasting::ForecastingError),

    #[error("core system error: {0}")]
    Core(#[from] shelfops_core::Error),
}

pub type Result<T> = std::result::Result<T, ReplayError>;
