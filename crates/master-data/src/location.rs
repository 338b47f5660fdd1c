//! Store (retail location) model, repository, and service.
//!
//! Grounded on `supplier/model.rs`'s FromRow/builder shape, trimmed for the
//! narrower set of fields spec.md §3 names for `Store`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfops_core::database::DatabasePool;
use shelfops_core::error::{Error, Result};
use shelfops_core::TenantContext;
use sqlx::FromRow;
use uuid::Uuid;

pub mod model {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
    #[sqlx(type_name = "store_status", rename_all = "snake_case")]
    pub enum StoreStatus {
        Active,
        Inactive,
        Onboarding,
    }

    impl Default for StoreStatus {
        fn default() -> Self {
            Self::Onboarding
        }
    }

    /// A retail location. `cluster_tier` drives the optimizer's safety-stock
    /// cluster multiplier (spec.md §4.H step 5): tier 0 = high-volume
    /// (+15% buffer), tier 1 = default, tier 2 = low-volume (-15% buffer).
    #[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
    pub struct Store {
        pub id: Uuid,
        pub tenant_id: Uuid,
        pub store_code: String,
        pub name: String,
        pub address: Option<String>,
        pub city: Option<String>,
        pub state: Option<String>,
        pub zip_code: Option<String>,
        pub latitude: Option<f64>,
        pub longitude: Option<f64>,
        pub timezone: String,
        pub status: StoreStatus,
        pub cluster_tier: Option<i16>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl Store {
        pub fn new(tenant_id: Uuid, store_code: String, name: String) -> Self {
            let now = Utc::now();
            Self {
                id: Uuid::new_v4(),
                tenant_id,
                store_code,
                name,
                address: None,
                city: None,
                state: None,
                zip_code: None,
                latitude: None,
                longitude: None,
                timezone: "America/New_York".to_string(),
                status: StoreStatus::default(),
                cluster_tier: None,
                created_at: now,
                updated_at: now,
            }
        }

        pub fn is_active(&self) -> bool {
            matches!(self.status, StoreStatus::Active)
        }

        /// Cluster tier with the spec.md default (tier 1) when unset.
        pub fn effective_cluster_tier(&self) -> i16 {
            self.cluster_tier.unwrap_or(1)
        }

        /// Cluster-tier safety-stock multiplier (spec.md §4.H step 5).
        pub fn cluster_multiplier(&self) -> f64 {
            match self.effective_cluster_tier() {
                0 => 1.15,
                2 => 0.85,
                _ => 1.00,
            }
        }
    }
}

pub mod repository {
    use super::model::Store;
    use super::*;

    #[async_trait]
    pub trait StoreRepository: Send + Sync {
        async fn create(&self, tenant: &TenantContext, store: &Store) -> Result<Store>;
        async fn get(&self, tenant: &TenantContext, id: Uuid) -> Result<Option<Store>>;
        async fn list(&self, tenant: &TenantContext) -> Result<Vec<Store>>;
        async fn update(&self, tenant: &TenantContext, store: &Store) -> Result<Store>;
    }

    pub struct PostgresStoreRepository {
        db: DatabasePool,
    }

    impl PostgresStoreRepository {
        pub fn new(db: DatabasePool) -> Self {
            Self { db }
        }
    }

    #[async_trait]
    impl StoreRepository for PostgresStoreRepository {
        async fn create(&self, tenant: &TenantContext, store: &Store) -> Result<Store> {
            let pool = self.db.get_tenant_pool(tenant).await?;
            let row = sqlx::query_as::<_, Store>(
                r#"
                INSERT INTO stores (
                    id, tenant_id, store_code, name, address, city, state, zip_code,
                    latitude, longitude, timezone, status, cluster_tier, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                RETURNING *
                "#,
            )
            .bind(store.id)
            .bind(tenant.tenant_id.0)
            .bind(&store.store_code)
            .bind(&store.name)
            .bind(&store.address)
            .bind(&store.city)
            .bind(&store.state)
            .bind(&store.zip_code)
            .bind(store.latitude)
            .bind(store.longitude)
            .bind(&store.timezone)
            .bind(&store.status)
            .bind(store.cluster_tier)
            .bind(store.created_at)
            .bind(store.updated_at)
            .fetch_one(pool.get())
            .await
            .map_err(|e| Error::new(shelfops_core::ErrorCode::DatabaseQueryError, e.to_string()))?;
            Ok(row)
        }

        async fn get(&self, tenant: &TenantContext, id: Uuid) -> Result<Option<Store>> {
            let pool = self.db.get_tenant_pool(tenant).await?;
            let row = sqlx::query_as::<_, Store>("SELECT * FROM stores WHERE id = $1")
                .bind(id)
                .fetch_optional(pool.get())
                .await
                .map_err(|e| Error::new(shelfops_core::ErrorCode::DatabaseQueryError, e.to_string()))?;
            Ok(row)
        }

        async fn list(&self, tenant: &TenantContext) -> Result<Vec<Store>> {
            let pool = self.db.get_tenant_pool(tenant).await?;
            let rows = sqlx::query_as::<_, Store>("SELECT * FROM stores ORDER BY store_code")
                .fetch_all(pool.get())
                .await
                .map_err(|e| Error::new(shelfops_core::ErrorCode::DatabaseQueryError, e.to_string()))?;
            Ok(rows)
        }

        async fn update(&self, tenant: &TenantContext, store: &Store) -> Result<Store> {
            let pool = self.db.get_tenant_pool(tenant).await?;
            let row = sqlx::query_as::<_, Store>(
                r#"
                UPDATE stores SET
                    name = $2, address = $3, city = $4, state = $5, zip_code = $6,
                    latitude = $7, longitude = $8, timezone = $9, status = $10,
                    cluster_tier = $11, updated_at = $12
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(store.id)
            .bind(&store.name)
            .bind(&store.address)
            .bind(&store.city)
            .bind(&store.state)
            .bind(&store.zip_code)
            .bind(store.latitude)
            .bind(store.longitude)
            .bind(&store.timezone)
            .bind(&store.status)
            .bind(store.cluster_tier)
            .bind(Utc::now())
            .fetch_one(pool.get())
            .await
            .map_err(|e| Error::new(shelfops_core::ErrorCode::DatabaseQueryError, e.to_string()))?;
            Ok(row)
        }
    }
}

pub mod service {
    use super::model::Store;
    use super::repository::StoreRepository;
    use super::*;
    use std::sync::Arc;

    pub struct StoreService {
        repo: Arc<dyn StoreRepository>,
    }

    impl StoreService {
        pub fn new(repo: Arc<dyn StoreRepository>) -> Self {
            Self { repo }
        }

        pub async fn create_store(
            &self,
            tenant: &TenantContext,
            store_code: String,
            name: String,
        ) -> Result<Store> {
            let store = Store::new(tenant.tenant_id.0, store_code, name);
            self.repo.create(tenant, &store).await
        }

        pub async fn get(&self, tenant: &TenantContext, id: Uuid) -> Result<Option<Store>> {
            self.repo.get(tenant, id).await
        }

        pub async fn list(&self, tenant: &TenantContext) -> Result<Vec<Store>> {
            self.repo.list(tenant).await
        }
    }
}

pub use model::{Store, StoreStatus};
pub use repository::{PostgresStoreRepository, StoreRepository};
pub use service::StoreService;

#[cfg(test)]
mod tests {
    use super::model::*;
    use uuid::Uuid;

    #[test]
    fn cluster_multiplier_matches_spec_table() {
        let tenant = Uuid::new_v4();
        let mut store = Store::new(tenant, "S001".into(), "Flagship".into());

        store.cluster_tier = Some(0);
        assert_eq!(store.cluster_multiplier(), 1.15);

        store.cluster_tier = Some(1);
        assert_eq!(store.cluster_multiplier(), 1.00);

        store.cluster_tier = Some(2);
        assert_eq!(store.cluster_multiplier(), 0.85);

        store.cluster_tier = None;
        assert_eq!(store.effective_cluster_tier(), 1);
        assert_eq!(store.cluster_multiplier(), 1.00);
    }
}
