//! Data access for inventory snapshots, sourcing rules, and reorder points.
//!
//! Grounded on `supplier/repository.rs`'s trait + `Postgres*Repository`
//! idiom, applied to the spec-exact entities in `inventory::model`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelfops_core::database::DatabasePool;
use shelfops_core::TenantContext;
use uuid::Uuid;

use super::model::{InventoryLevel, ProductSourcingRule, ReorderHistory, ReorderPoint};
use crate::error::{MasterDataError, Result};

#[async_trait]
pub trait InventoryLevelRepository: Send + Sync {
    async fn record(&self, tenant: &TenantContext, level: &InventoryLevel) -> Result<InventoryLevel>;
    /// Most recent snapshot for a (store, product) pair, if any.
    async fn latest(
        &self,
        tenant: &TenantContext,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<InventoryLevel>>;
    async fn latest_for_store(&self, tenant: &TenantContext, store_id: Uuid) -> Result<Vec<InventoryLevel>>;
    async fn history(
        &self,
        tenant: &TenantContext,
        store_id: Uuid,
        product_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<InventoryLevel>>;
}

pub struct PostgresInventoryLevelRepository {
    db: DatabasePool,
}

impl PostgresInventoryLevelRepository {
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InventoryLevelRepository for PostgresInventoryLevelRepository {
    async fn record(&self, tenant: &TenantContext, level: &InventoryLevel) -> Result<InventoryLevel> {
        let pool = self.db.get_tenant_pool(tenant).await?;
        let row = sqlx::query_as::<_, InventoryLevel>(
            r#"INSERT INTO inventory_levels
                (id, tenant_id, store_id, product_id, timestamp, quantity_on_hand,
                 quantity_on_order, quantity_reserved, quantity_available, source)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
               RETURNING *"#,
        )
        .bind(level.id)
        .bind(level.tenant_id)
        .bind(level.store_id)
        .bind(level.product_id)
        .bind(level.timestamp)
        .bind(level.quantity_on_hand)
        .bind(level.quantity_on_order)
        .bind(level.quantity_reserved)
        .bind(level.quantity_available)
        .bind(&level.source)
        .fetch_one(pool.get())
        .await?;
        Ok(row)
    }

    async fn latest(
        &self,
        tenant: &TenantContext,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<InventoryLevel>> {
        let pool = self.db.get_tenant_pool(tenant).await?;
        let row = sqlx::query_as::<_, InventoryLevel>(
            r#"SELECT * FROM inventory_levels
               WHERE store_id = $1 AND product_id = $2
               ORDER BY timestamp DESC LIMIT 1"#,
        )
        .bind(store_id)
        .bind(product_id)
        .fetch_optional(pool.get())
        .await?;
        Ok(row)
    }

    async fn latest_for_store(&self, tenant: &TenantContext, store_id: Uuid) -> Result<Vec<InventoryLevel>> {
        let pool = self.db.get_tenant_pool(tenant).await?;
        let rows = sqlx::query_as::<_, InventoryLevel>(
            r#"SELECT DISTINCT ON (product_id) *
               FROM inventory_levels
               WHERE store_id = $1
               ORDER BY product_id, timestamp DESC"#,
        )
        .bind(store_id)
        .fetch_all(pool.get())
        .await?;
        Ok(rows)
    }

    async fn history(
        &self,
        tenant: &TenantContext,
        store_id: Uuid,
        product_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<InventoryLevel>> {
        let pool = self.db.get_tenant_pool(tenant).await?;
        let rows = sqlx::query_as::<_, InventoryLevel>(
            r#"SELECT * FROM inventory_levels
               WHERE store_id = $1 AND product_id = $2 AND timestamp >= $3
               ORDER BY timestamp ASC"#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(since)
        .fetch_all(pool.get())
        .await?;
        Ok(rows)
    }
}

#[async_trait]
pub trait SourcingRuleRepository: Send + Sync {
    async fn create(&self, tenant: &TenantContext, rule: &ProductSourcingRule) -> Result<ProductSourcingRule>;
    /// Active rules for a product, ordered by priority (lowest first), the
    /// order the optimizer consults them in (spec.md §4.H step 2).
    async fn list_for_product(
        &self,
        tenant: &TenantContext,
        product_id: Uuid,
    ) -> Result<Vec<ProductSourcingRule>>;
    async fn deactivate(&self, tenant: &TenantContext, id: Uuid) -> Result<()>;
}

pub struct PostgresSourcingRuleRepository {
    db: DatabasePool,
}

impl PostgresSourcingRuleRepository {
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SourcingRuleRepository for PostgresSourcingRuleRepository {
    async fn create(&self, tenant: &TenantContext, rule: &ProductSourcingRule) -> Result<ProductSourcingRule> {
        let pool = self.db.get_tenant_pool(tenant).await?;
        let row = sqlx::query_as::<_, ProductSourcingRule>(
            r#"INSERT INTO product_sourcing_rules
                (id, tenant_id, product_id, store_id, source_type, source_id, source_name,
                 lead_time_mean_days, lead_time_variance, min_order_qty, cost_per_order,
                 priority, active, created_at, updated_at)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
               RETURNING *"#,
        )
        .bind(rule.id)
        .bind(rule.tenant_id)
        .bind(rule.product_id)
        .bind(rule.store_id)
        .bind(rule.source_type)
        .bind(rule.source_id)
        .bind(&rule.source_name)
        .bind(rule.lead_time_mean_days)
        .bind(rule.lead_time_variance)
        .bind(rule.min_order_qty)
        .bind(rule.cost_per_order)
        .bind(rule.priority)
        .bind(rule.active)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .fetch_one(pool.get())
        .await?;
        Ok(row)
    }

    async fn list_for_product(
        &self,
        tenant: &TenantContext,
        product_id: Uuid,
    ) -> Result<Vec<ProductSourcingRule>> {
        let pool = self.db.get_tenant_pool(tenant).await?;
        let rows = sqlx::query_as::<_, ProductSourcingRule>(
            "SELECT * FROM product_sourcing_rules WHERE product_id = $1 AND active = true ORDER BY priority ASC",
        )
        .bind(product_id)
        .fetch_all(pool.get())
        .await?;
        Ok(rows)
    }

    async fn deactivate(&self, tenant: &TenantContext, id: Uuid) -> Result<()> {
        let pool = self.db.get_tenant_pool(tenant).await?;
        sqlx::query("UPDATE product_sourcing_rules SET active = false, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(pool.get())
            .await?;
        Ok(())
    }
}

#[async_trait]
pub trait ReorderPointRepository: Send + Sync {
    async fn get(
        &self,
        tenant: &TenantContext,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<ReorderPoint>>;
    async fn list_for_store(&self, tenant: &TenantContext, store_id: Uuid) -> Result<Vec<ReorderPoint>>;
    /// Upserts the reorder point and, in the same transaction, writes the
    /// audit trail entry. Callers apply the 10%-change gate before invoking
    /// this (spec.md §4.H step 8) — this method never skips the write.
    async fn upsert_with_history(
        &self,
        tenant: &TenantContext,
        point: &ReorderPoint,
        history: &ReorderHistory,
        is_new: bool,
    ) -> Result<ReorderPoint>;
}

pub struct PostgresReorderPointRepository {
    db: DatabasePool,
}

impl PostgresReorderPointRepository {
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReorderPointRepository for PostgresReorderPointRepository {
    async fn get(
        &self,
        tenant: &TenantContext,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<ReorderPoint>> {
        let pool = self.db.get_tenant_pool(tenant).await?;
        let row = sqlx::query_as::<_, ReorderPoint>(
            "SELECT * FROM reorder_points WHERE store_id = $1 AND product_id = $2",
        )
        .bind(store_id)
        .bind(product_id)
        .fetch_optional(pool.get())
        .await?;
        Ok(row)
    }

    async fn list_for_store(&self, tenant: &TenantContext, store_id: Uuid) -> Result<Vec<ReorderPoint>> {
        let pool = self.db.get_tenant_pool(tenant).await?;
        let rows = sqlx::query_as::<_, ReorderPoint>("SELECT * FROM reorder_points WHERE store_id = $1")
            .bind(store_id)
            .fetch_all(pool.get())
            .await?;
        Ok(rows)
    }

    async fn upsert_with_history(
        &self,
        tenant: &TenantContext,
        point: &ReorderPoint,
        history: &ReorderHistory,
        is_new: bool,
    ) -> Result<ReorderPoint> {
        let pool = self.db.get_tenant_pool(tenant).await?;
        let mut tx = pool.get().begin().await.map_err(MasterDataError::from)?;

        if is_new {
            sqlx::query(
                r#"INSERT INTO reorder_points
                    (id, tenant_id, store_id, product_id, reorder_point, safety_stock,
                     economic_order_qty, lead_time_days, service_level, last_calculated)
                   VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)"#,
            )
            .bind(point.id)
            .bind(point.tenant_id)
            .bind(point.store_id)
            .bind(point.product_id)
            .bind(point.reorder_point)
            .bind(point.safety_stock)
            .bind(point.economic_order_qty)
            .bind(point.lead_time_days)
            .bind(point.service_level)
            .bind(point.last_calculated)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                r#"UPDATE reorder_points SET
                    reorder_point = $2, safety_stock = $3, economic_order_qty = $4,
                    lead_time_days = $5, last_calculated = $6
                   WHERE id = $1"#,
            )
            .bind(point.id)
            .bind(point.reorder_point)
            .bind(point.safety_stock)
            .bind(point.economic_order_qty)
            .bind(point.lead_time_days)
            .bind(point.last_calculated)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"INSERT INTO reorder_history
                (id, tenant_id, store_id, product_id, old_reorder_point, new_reorder_point,
                 old_safety_stock, new_safety_stock, old_eoq, new_eoq, calculation_rationale, calculated_at)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)"#,
        )
        .bind(history.id)
        .bind(history.tenant_id)
        .bind(history.store_id)
        .bind(history.product_id)
        .bind(history.old_reorder_point)
        .bind(history.new_reorder_point)
        .bind(history.old_safety_stock)
        .bind(history.new_safety_stock)
        .bind(history.old_eoq)
        .bind(history.new_eoq)
        .bind(&history.calculation_rationale)
        .bind(history.calculated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(point.clone())
    }
}
