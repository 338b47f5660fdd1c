//! Thin service layer over the inventory repositories.
//!
//! Grounded on `supplier/service.rs`'s `Service { repo: Arc<dyn Repository> }`
//! shape.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shelfops_core::TenantContext;
use uuid::Uuid;

use super::model::{InventoryLevel, ProductSourcingRule, ReorderPoint};
use super::repository::{InventoryLevelRepository, ReorderPointRepository, SourcingRuleRepository};
use crate::error::Result;

pub struct InventoryLevelService {
    repo: Arc<dyn InventoryLevelRepository>,
}

impl InventoryLevelService {
    pub fn new(repo: Arc<dyn InventoryLevelRepository>) -> Self {
        Self { repo }
    }

    pub async fn record_snapshot(
        &self,
        tenant: &TenantContext,
        store_id: Uuid,
        product_id: Uuid,
        on_hand: i32,
        on_order: i32,
        reserved: i32,
        source: impl Into<String>,
    ) -> Result<InventoryLevel> {
        let level = InventoryLevel::new(tenant.tenant_id.0, store_id, product_id, on_hand, on_order, reserved, source);
        self.repo.record(tenant, &level).await
    }

    pub async fn latest(&self, tenant: &TenantContext, store_id: Uuid, product_id: Uuid) -> Result<Option<InventoryLevel>> {
        self.repo.latest(tenant, store_id, product_id).await
    }

    pub async fn latest_for_store(&self, tenant: &TenantContext, store_id: Uuid) -> Result<Vec<InventoryLevel>> {
        self.repo.latest_for_store(tenant, store_id).await
    }

    pub async fn history(
        &self,
        tenant: &TenantContext,
        store_id: Uuid,
        product_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<InventoryLevel>> {
        self.repo.history(tenant, store_id, product_id, since).await
    }
}

pub struct SourcingRuleService {
    repo: Arc<dyn SourcingRuleRepository>,
}

impl SourcingRuleService {
    pub fn new(repo: Arc<dyn SourcingRuleRepository>) -> Self {
        Self { repo }
    }

    pub async fn create_rule(&self, tenant: &TenantContext, rule: ProductSourcingRule) -> Result<ProductSourcingRule> {
        self.repo.create(tenant, &rule).await
    }

    pub async fn rules_for_product(&self, tenant: &TenantContext, product_id: Uuid) -> Result<Vec<ProductSourcingRule>> {
        self.repo.list_for_product(tenant, product_id).await
    }

    pub async fn deactivate(&self, tenant: &TenantContext, id: Uuid) -> Result<()> {
        self.repo.deactivate(tenant, id).await
    }
}

pub struct ReorderPointService {
    repo: Arc<dyn ReorderPointRepository>,
}

impl ReorderPointService {
    pub fn new(repo: Arc<dyn ReorderPointRepository>) -> Self {
        Self { repo }
    }

    pub async fn get(&self, tenant: &TenantContext, store_id: Uuid, product_id: Uuid) -> Result<Option<ReorderPoint>> {
        self.repo.get(tenant, store_id, product_id).await
    }

    /// All reorder points for a store, used by the stockout/reorder alert
    /// detectors (spec.md §4.I) to avoid an N+1 per-product query.
    pub async fn list_for_store(&self, tenant: &TenantContext, store_id: Uuid) -> Result<Vec<ReorderPoint>> {
        self.repo.list_for_store(tenant, store_id).await
    }
}
