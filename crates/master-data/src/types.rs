//! Shared pagination and lightweight tenant-context types used by the
//! product/supplier search and list APIs.
//!
//! `TenantContext` here is intentionally distinct from
//! `shelfops_core::TenantContext`: the latter is the handle threaded through
//! `DatabasePool` per spec.md §4.A (schema-per-tenant pool resolution); this
//! one is a plain `(tenant_id, user_id)` bag passed to the product/supplier
//! services, whose repositories take `tenant_id: Uuid` directly rather than
//! a pool handle.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
}

impl TenantContext {
    pub fn new(tenant_id: Uuid, user_id: Uuid) -> Self {
        Self { tenant_id, user_id }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationOptions {
    pub page: i64,
    pub limit: i64,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}
