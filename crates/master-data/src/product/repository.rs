//! Product repository: CRUD and search over the tenant's product catalog.

use super::model::{
    CreateProductRequest, Product, ProductCategory, ProductLifecycleState, ProductSearchFilters,
    ProductSummary, UpdateProductRequest,
};
use crate::types::{PaginationOptions, PaginationResult};
use async_trait::async_trait;
use chrono::Utc;
use shelfops_core::database::DatabasePool;
use shelfops_core::error::{Error, ErrorCode, Result};
use uuid::Uuid;

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create_product(&self, tenant_id: Uuid, request: CreateProductRequest, created_by: Uuid) -> Result<Product>;
    async fn get_product_by_id(&self, tenant_id: Uuid, product_id: Uuid) -> Result<Option<Product>>;
    async fn get_product_by_sku(&self, tenant_id: Uuid, sku: &str) -> Result<Option<Product>>;
    async fn update_product(&self, tenant_id: Uuid, product_id: Uuid, request: UpdateProductRequest) -> Result<Product>;
    async fn set_lifecycle_state(&self, tenant_id: Uuid, product_id: Uuid, state: ProductLifecycleState) -> Result<Product>;
    async fn delete_product(&self, tenant_id: Uuid, product_id: Uuid) -> Result<()>;

    async fn search_products(
        &self,
        tenant_id: Uuid,
        filters: &ProductSearchFilters,
        pagination: &PaginationOptions,
    ) -> Result<PaginationResult<ProductSummary>>;

    async fn create_category(&self, category: &ProductCategory) -> Result<ProductCategory>;
    async fn list_categories(&self, tenant_id: Uuid) -> Result<Vec<ProductCategory>>;
}

pub struct PostgresProductRepository {
    db: DatabasePool,
}

impl PostgresProductRepository {
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }

    fn get_pool(&self) -> &sqlx::PgPool {
        &self.db.main_pool
    }
}

#[async_trait]
impl ProductRepository for PostgresProductRepository {
    async fn create_product(&self, tenant_id: Uuid, request: CreateProductRequest, created_by: Uuid) -> Result<Product> {
        let mut product = Product::new(tenant_id, request.sku, request.name, created_by);
        product.category_id = request.category_id;
        product.is_perishable = request.is_perishable;
        product.shelf_life_days = request.shelf_life_days;
        product.unit_cost = request.unit_cost;
        product.unit_price = request.unit_price;
        product.holding_cost_per_unit_per_day = request.holding_cost_per_unit_per_day;
        product.primary_supplier_id = request.primary_supplier_id;
        product.barcode = request.barcode;

        sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                id, tenant_id, sku, name, category_id, lifecycle_state,
                is_perishable, shelf_life_days, unit_cost, unit_price,
                holding_cost_per_unit_per_day, primary_supplier_id, barcode,
                created_at, updated_at, created_by, updated_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(product.tenant_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.category_id)
        .bind(product.lifecycle_state)
        .bind(product.is_perishable)
        .bind(product.shelf_life_days)
        .bind(product.unit_cost)
        .bind(product.unit_price)
        .bind(product.holding_cost_per_unit_per_day)
        .bind(product.primary_supplier_id)
        .bind(&product.barcode)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.created_by)
        .bind(product.updated_by)
        .fetch_one(self.get_pool())
        .await
        .map_err(|e| Error::new(ErrorCode::DatabaseQueryError, format!("failed to create product: {e}")))
    }

    async fn get_product_by_id(&self, tenant_id: Uuid, product_id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND tenant_id = $2")
            .bind(product_id)
            .bind(tenant_id)
            .fetch_optional(self.get_pool())
            .await
            .map_err(|e| Error::new(ErrorCode::DatabaseQueryError, format!("failed to get product: {e}")))
    }

    async fn get_product_by_sku(&self, tenant_id: Uuid, sku: &str) -> Result<Option<Product>> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = $1 AND tenant_id = $2")
            .bind(sku)
            .bind(tenant_id)
            .fetch_optional(self.get_pool())
            .await
            .map_err(|e| Error::new(ErrorCode::DatabaseQueryError, format!("failed to get product by sku: {e}")))
    }

    async fn update_product(&self, tenant_id: Uuid, product_id: Uuid, request: UpdateProductRequest) -> Result<Product> {
        let existing = self
            .get_product_by_id(tenant_id, product_id)
            .await?
            .ok_or_else(|| Error::new(ErrorCode::NotFound, "product not found"))?;

        let merged = Product {
            name: request.name.unwrap_or(existing.name),
            category_id: request.category_id.or(existing.category_id),
            is_perishable: request.is_perishable.unwrap_or(existing.is_perishable),
            shelf_life_days: request.shelf_life_days.or(existing.shelf_life_days),
            unit_cost: request.unit_cost.unwrap_or(existing.unit_cost),
            unit_price: request.unit_price.unwrap_or(existing.unit_price),
            holding_cost_per_unit_per_day: request
                .holding_cost_per_unit_per_day
                .or(existing.holding_cost_per_unit_per_day),
            primary_supplier_id: request.primary_supplier_id.or(existing.primary_supplier_id),
            barcode: request.barcode.or(existing.barcode),
            updated_at: Utc::now(),
            ..existing
        };

        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                name = $3, category_id = $4, is_perishable = $5, shelf_life_days = $6,
                unit_cost = $7, unit_price = $8, holding_cost_per_unit_per_day = $9,
                primary_supplier_id = $10, barcode = $11, updated_at = $12
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(tenant_id)
        .bind(&merged.name)
        .bind(merged.category_id)
        .bind(merged.is_perishable)
        .bind(merged.shelf_life_days)
        .bind(merged.unit_cost)
        .bind(merged.unit_price)
        .bind(merged.holding_cost_per_unit_per_day)
        .bind(merged.primary_supplier_id)
        .bind(&merged.barcode)
        .bind(merged.updated_at)
        .fetch_one(self.get_pool())
        .await
        .map_err(|e| Error::new(ErrorCode::DatabaseQueryError, format!("failed to update product: {e}")))
    }

    async fn set_lifecycle_state(&self, tenant_id: Uuid, product_id: Uuid, state: ProductLifecycleState) -> Result<Product> {
        sqlx::query_as::<_, Product>(
            "UPDATE products SET lifecycle_state = $3, updated_at = $4 WHERE id = $1 AND tenant_id = $2 RETURNING *",
        )
        .bind(product_id)
        .bind(tenant_id)
        .bind(state)
        .bind(Utc::now())
        .fetch_one(self.get_pool())
        .await
        .map_err(|e| Error::new(ErrorCode::DatabaseQueryError, format!("failed to set lifecycle state: {e}")))
    }

    async fn delete_product(&self, tenant_id: Uuid, product_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND tenant_id = $2")
            .bind(product_id)
            .bind(tenant_id)
            .execute(self.get_pool())
            .await
            .map_err(|e| Error::new(ErrorCode::DatabaseQueryError, format!("failed to delete product: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(Error::new(ErrorCode::NotFound, "product not found"));
        }
        Ok(())
    }

    async fn search_products(
        &self,
        tenant_id: Uuid,
        filters: &ProductSearchFilters,
        pagination: &PaginationOptions,
    ) -> Result<PaginationResult<ProductSummary>> {
        let offset = (pagination.page - 1).max(0) * pagination.limit;

        let items = sqlx::query_as::<_, ProductSummary>(
            r#"
            SELECT p.id, p.sku, p.name, p.lifecycle_state, p.unit_price,
                   c.name AS category_name, p.created_at
            FROM products p
            LEFT JOIN product_categories c ON c.id = p.category_id
            WHERE p.tenant_id = $1
              AND ($2::uuid IS NULL OR p.category_id = $2)
              AND ($3::product_lifecycle_state IS NULL OR p.lifecycle_state = $3)
              AND ($4::uuid IS NULL OR p.primary_supplier_id = $4)
              AND ($5::text IS NULL OR p.name ILIKE '%' || $5 || '%' OR p.sku ILIKE '%' || $5 || '%')
            ORDER BY p.created_at DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(tenant_id)
        .bind(filters.category_id)
        .bind(filters.lifecycle_state)
        .bind(filters.supplier_id)
        .bind(&filters.query)
        .bind(pagination.limit)
        .bind(offset)
        .fetch_all(self.get_pool())
        .await
        .map_err(|e| Error::new(ErrorCode::DatabaseQueryError, format!("failed to search products: {e}")))?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(self.get_pool())
            .await
            .map_err(|e| Error::new(ErrorCode::DatabaseQueryError, format!("failed to count products: {e}")))?;

        Ok(PaginationResult {
            total_pages: (total as f64 / pagination.limit.max(1) as f64).ceil() as i64,
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
        })
    }

    async fn create_category(&self, category: &ProductCategory) -> Result<ProductCategory> {
        sqlx::query_as::<_, ProductCategory>(
            "INSERT INTO product_categories (id, tenant_id, name, parent_id, created_at) VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(category.id)
        .bind(category.tenant_id)
        .bind(&category.name)
        .bind(category.parent_id)
        .bind(category.created_at)
        .fetch_one(self.get_pool())
        .await
        .map_err(|e| Error::new(ErrorCode::DatabaseQueryError, format!("failed to create category: {e}")))
    }

    async fn list_categories(&self, tenant_id: Uuid) -> Result<Vec<ProductCategory>> {
        sqlx::query_as::<_, ProductCategory>("SELECT * FROM product_categories WHERE tenant_id = $1 ORDER BY name")
            .bind(tenant_id)
            .fetch_all(self.get_pool())
            .await
            .map_err(|e| Error::new(ErrorCode::DatabaseQueryError, format!("failed to list categories: {e}")))
    }
}
