//! `IngestionAdapter`: the capability set every integration adapter
//! (EDI/SFTP/Event/POS) implements (spec.md §4.C).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{AdapterKind, SyncResult};

#[async_trait]
pub trait IngestionAdapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    async fn test_connection(&self) -> Result<bool>;

    async fn sync_stores(&self) -> Result<SyncResult>;

    async fn sync_products(&self) -> Result<SyncResult>;

    async fn sync_transactions(&self, since: Option<DateTime<Utc>>) -> Result<SyncResult>;

    async fn sync_inventory(&self) -> Result<SyncResult>;
}
