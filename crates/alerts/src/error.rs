use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertsError {
    #[error("alert not found: {id}")]
    AlertNotFound { id: String },

    #[error("alert {id} is not a reorder_recommended alert and cannot be ordered")]
    NotOrderable { id: String },

    #[error("order quantity must be > 0, got {quantity}")]
    InvalidQuantity { quantity: i64 },

    #[error("reason_code is required when overriding the suggested quantity")]
    ReasonCodeRequired,

    #[error("invalid state transition for alert {id}: {from} -> {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("core system error: {0}")]
    Core(#[from] shelfops_core::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AlertsError>;
