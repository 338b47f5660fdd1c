use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a tenant (retail operator) across every schema-qualified table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantStatus {
    Active,
    Suspended,
    Deleted,
}

/// The tenant handle threaded through every repository and pipeline call.
///
/// Every operation that touches tenant-scoped data takes a `&TenantContext`
/// rather than relying on an ambient/session-level tenant id, so a bug in
/// one request can never bleed state into another tenant's pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub schema_name: String,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, schema_name: impl Into<String>) -> Self {
        Self {
            tenant_id,
            schema_name: schema_name.into(),
        }
    }
}
