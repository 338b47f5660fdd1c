//! Shared adapter vocabulary (spec.md §4.C): capability set, `SyncResult`,
//! and the EDI/integration audit log rows every adapter emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Edi,
    Sftp,
    EventStream,
    Pos,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Edi => "edi",
            AdapterKind::Sftp => "sftp",
            AdapterKind::EventStream => "event_stream",
            AdapterKind::Pos => "pos",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Partial,
    Failed,
    NoData,
}

/// Outcome of a single sync call against one capability
/// (`sync_stores`/`sync_products`/`sync_transactions`/`sync_inventory`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub status: SyncStatus,
    pub records_processed: u64,
    pub records_failed: u64,
    pub errors: Vec<String>,
    pub metadata: Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncResult {
    pub fn new(status: SyncStatus) -> Self {
        Self {
            status,
            records_processed: 0,
            records_failed: 0,
            errors: Vec::new(),
            metadata: Value::Object(Default::default()),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn no_data() -> Self {
        Self::new(SyncStatus::NoData).complete()
    }

    pub fn record_success(&mut self, count: u64) {
        self.records_processed += count;
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.records_failed += 1;
        self.errors.push(error.into());
    }

    /// Finalizes `status` from the processed/failed counters and stamps
    /// `completed_at`. Mirrors the Python adapters' `result.complete()`.
    pub fn complete(mut self) -> Self {
        if self.records_failed > 0 && self.records_processed == 0 {
            self.status = SyncStatus::Failed;
        } else if self.records_failed > 0 {
            self.status = SyncStatus::Partial;
        }
        self.completed_at = Some(Utc::now());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdiDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdiTransactionStatus {
    Received,
    Parsing,
    Processed,
    Failed,
    Acknowledged,
}

/// Audit-compliance row for a single EDI document (spec.md §4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdiTransactionLog {
    pub id: Uuid,
    pub document_type: String,
    pub direction: EdiDirection,
    pub status: EdiTransactionStatus,
    pub parsed_records: u64,
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl EdiTransactionLog {
    pub fn new(document_type: impl Into<String>, direction: EdiDirection) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_type: document_type.into(),
            direction,
            status: EdiTransactionStatus::Received,
            parsed_records: 0,
            errors: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Per-(tenant, adapter, sync-type) companion log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationSyncLog {
    pub id: Uuid,
    pub adapter: AdapterKind,
    pub sync_type: String,
    pub result: SyncResult,
}

impl IntegrationSyncLog {
    pub fn new(adapter: AdapterKind, sync_type: impl Into<String>, result: SyncResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            adapter,
            sync_type: sync_type.into(),
            result,
        }
    }
}
