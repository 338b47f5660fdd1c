pub mod audit;
pub mod config;
pub mod database;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod types;
pub mod utils;

pub use audit::{AuditBackend, AuditEvent, AuditLogger};
pub use config::Settings;
pub use database::{DatabasePool, TenantPool};
pub use error::{Error, ErrorCode, ErrorContext, ErrorMetrics, Result};
pub use jobs::{Job, JobContext, JobExecutor, JobQueue, JobResult};
pub use metrics::MetricsRegistry;
pub use types::{TenantContext, TenantId};

// Re-export commonly used types from dependencies
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;
