//! Product service: catalog CRUD plus the lifecycle transitions the
//! replenishment pipeline depends on (spec.md §3 Product lifecycle state).

use super::model::{
    CreateProductRequest, Product, ProductCategory, ProductLifecycleState, ProductSearchFilters,
    ProductSummary, UpdateProductRequest,
};
use super::repository::ProductRepository;
use crate::types::{PaginationOptions, PaginationResult, TenantContext};
use async_trait::async_trait;
use shelfops_core::error::Result;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait ProductService: Send + Sync {
    async fn create_product(&self, request: CreateProductRequest) -> Result<Product>;
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>>;
    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>>;
    async fn update_product(&self, product_id: Uuid, request: UpdateProductRequest) -> Result<Product>;
    async fn delete_product(&self, product_id: Uuid) -> Result<()>;

    /// Transition to `Active`: the only state the optimizer and alert engine
    /// evaluate for replenishment (spec.md §3, `is_replenishment_eligible`).
    async fn activate_product(&self, product_id: Uuid) -> Result<Product>;
    async fn delist_product(&self, product_id: Uuid) -> Result<Product>;
    async fn discontinue_product(&self, product_id: Uuid) -> Result<Product>;

    async fn search_products(&self, filters: ProductSearchFilters, pagination: PaginationOptions) -> Result<PaginationResult<ProductSummary>>;

    async fn create_category(&self, name: String, parent_id: Option<Uuid>) -> Result<ProductCategory>;
    async fn list_categories(&self) -> Result<Vec<ProductCategory>>;
}

pub struct DefaultProductService {
    repository: Arc<dyn ProductRepository>,
    tenant_context: TenantContext,
}

impl DefaultProductService {
    pub fn new(repository: Arc<dyn ProductRepository>, tenant_context: TenantContext) -> Self {
        Self { repository, tenant_context }
    }
}

#[async_trait]
impl ProductService for DefaultProductService {
    async fn create_product(&self, request: CreateProductRequest) -> Result<Product> {
        self.repository
            .create_product(self.tenant_context.tenant_id, request, self.tenant_context.user_id)
            .await
    }

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>> {
        self.repository.get_product_by_id(self.tenant_context.tenant_id, product_id).await
    }

    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        self.repository.get_product_by_sku(self.tenant_context.tenant_id, sku).await
    }

    async fn update_product(&self, product_id: Uuid, request: UpdateProductRequest) -> Result<Product> {
        self.repository.update_product(self.tenant_context.tenant_id, product_id, request).await
    }

    async fn delete_product(&self, product_id: Uuid) -> Result<()> {
        self.repository.delete_product(self.tenant_context.tenant_id, product_id).await
    }

    async fn activate_product(&self, product_id: Uuid) -> Result<Product> {
        self.repository
            .set_lifecycle_state(self.tenant_context.tenant_id, product_id, ProductLifecycleState::Active)
            .await
    }

    async fn delist_product(&self, product_id: Uuid) -> Result<Product> {
        self.repository
            .set_lifecycle_state(self.tenant_context.tenant_id, product_id, ProductLifecycleState::Delisted)
            .await
    }

    async fn discontinue_product(&self, product_id: Uuid) -> Result<Product> {
        self.repository
            .set_lifecycle_state(self.tenant_context.tenant_id, product_id, ProductLifecycleState::Discontinued)
            .await
    }

    async fn search_products(&self, filters: ProductSearchFilters, pagination: PaginationOptions) -> Result<PaginationResult<ProductSummary>> {
        self.repository.search_products(self.tenant_context.tenant_id, &filters, &pagination).await
    }

    async fn create_category(&self, name: String, parent_id: Option<Uuid>) -> Result<ProductCategory> {
        let category = ProductCategory::new(self.tenant_context.tenant_id, name, parent_id);
        self.repository.create_category(&category).await
    }

    async fn list_categories(&self) -> Result<Vec<ProductCategory>> {
        self.repository.list_categories(self.tenant_context.tenant_id).await
    }
}
