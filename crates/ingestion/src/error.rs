use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("adapter I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("contract error: {0}")]
    Contract(#[from] shelfops_contracts::ContractError),

    #[error("core system error: {0}")]
    Core(#[from] shelfops_core::Error),
}

pub type Result<T> = std::result::Result<T, IngestionError>;
