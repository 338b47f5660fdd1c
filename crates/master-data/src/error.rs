use thiserror::Error;

/// Master Data specific errors
#[derive(Error, Debug)]
pub enum MasterDataError {
    #[error("Supplier not found: {id}")]
    SupplierNotFound { id: String },

    #[error("Product not found: {id}")]
    ProductNotFound { id: String },

    #[error("Store not found: {id}")]
    StoreNotFound { id: String },

    #[error("Entity not found")]
    NotFound,

    #[error("Invalid supplier number format: {number}")]
    InvalidSupplierNumber { number: String },

    #[error("Invalid product number format: {number}")]
    InvalidProductNumber { number: String },

    #[error("Duplicate supplier number: {number}")]
    DuplicateSupplierNumber { number: String },

    #[error("Duplicate product number: {number}")]
    DuplicateProductNumber { number: String },

    #[error("Supplier has active purchase orders and cannot be deleted")]
    SupplierHasActivePurchaseOrders,

    #[error("Product has active inventory and cannot be deleted")]
    ProductHasActiveInventory,

    #[error("Validation error: {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Data quality issue: {entity_type}: {entity_id}: {issue}")]
    DataQualityIssue {
        entity_type: String,
        entity_id: String,
        issue: String,
    },

    #[error("Synchronization conflict: {entity_type}: {entity_id}: local version {local_version} conflicts with remote version {remote_version}")]
    SynchronizationConflict {
        entity_type: String,
        entity_id: String,
        local_version: i32,
        remote_version: i32,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Core system error: {0}")]
    Core(#[from] shelfops_core::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type Result<T> = std::result::Result<T, MasterDataError>;
