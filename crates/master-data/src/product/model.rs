//! Product data model.
//!
//! Grounded on `location.rs`'s lean `FromRow` + builder shape, trimmed to
//! exactly the attributes spec.md §3 names for `Product`: lifecycle state,
//! perishability, shelf-life, unit cost/price, holding cost, and supplier
//! reference. Catalog bookkeeping (SKU, name, category) is carried because
//! `Product` is a tenant-owned reference entity operators create and edit,
//! not because spec.md calls for a full catalog/PIM surface.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Replenishment lifecycle state (spec.md §3 Product). This is the state the
/// alert engine and optimizer consult to decide whether a product is
/// eligible for reorder recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "product_lifecycle_state", rename_all = "snake_case")]
pub enum ProductLifecycleState {
    Active,
    SeasonalOut,
    Delisted,
    Discontinued,
    Test,
    PendingActivation,
}

impl Default for ProductLifecycleState {
    fn default() -> Self {
        Self::PendingActivation
    }
}

impl ProductLifecycleState {
    /// Whether the optimizer and alert detectors should consider this
    /// product for reorder/stockout evaluation.
    pub fn is_replenishment_eligible(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// A product catalog entry, tenant-owned. spec.md §3 Product.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: Uuid,

    pub sku: String,
    pub name: String,
    pub category_id: Option<Uuid>,

    pub lifecycle_state: ProductLifecycleState,
    pub is_perishable: bool,
    pub shelf_life_days: Option<i32>,

    pub unit_cost: Decimal,
    pub unit_price: Decimal,
    /// Holding cost per unit per day; falls back to `unit_cost * 0.25 / 365`
    /// when unset (spec.md §4.H step 7, `effective_holding_cost_per_unit_per_day`).
    pub holding_cost_per_unit_per_day: Option<Decimal>,

    pub primary_supplier_id: Option<Uuid>,
    pub barcode: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub updated_by: Uuid,
}

impl Product {
    pub fn new(tenant_id: Uuid, sku: String, name: String, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            sku,
            name,
            category_id: None,
            lifecycle_state: ProductLifecycleState::default(),
            is_perishable: false,
            shelf_life_days: None,
            unit_cost: Decimal::ZERO,
            unit_price: Decimal::ZERO,
            holding_cost_per_unit_per_day: None,
            primary_supplier_id: None,
            barcode: None,
            created_at: now,
            updated_at: now,
            created_by,
            updated_by: created_by,
        }
    }

    /// Whether the replenishment pipeline (optimizer, alert engine) should
    /// evaluate this product for this store.
    pub fn is_replenishment_eligible(&self) -> bool {
        self.lifecycle_state.is_replenishment_eligible()
    }

    /// Holding cost per unit per day, falling back to
    /// `unit_cost * 0.25 / 365` when not explicitly set (spec.md §4.H step 7).
    pub fn effective_holding_cost_per_unit_per_day(&self) -> Decimal {
        self.holding_cost_per_unit_per_day
            .unwrap_or_else(|| self.unit_cost * Decimal::new(25, 2) / Decimal::from(365))
    }

    pub fn profit_margin(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        let price = self.unit_price.to_f64()?;
        let cost = self.unit_cost.to_f64()?;
        if price <= 0.0 {
            return None;
        }
        Some(((price - cost) / price) * 100.0)
    }
}

/// Product category, used to resolve the canonical contract's `category`
/// column and for catalog organization. spec.md §3 treats categories as a
/// plain classification, not a merchandising hierarchy, so this stays flat
/// aside from the optional parent for nested catalogs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductCategory {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ProductCategory {
    pub fn new(tenant_id: Uuid, name: String, parent_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name,
            parent_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub category_id: Option<Uuid>,
    pub is_perishable: bool,
    pub shelf_life_days: Option<i32>,
    pub unit_cost: Decimal,
    pub unit_price: Decimal,
    pub holding_cost_per_unit_per_day: Option<Decimal>,
    pub primary_supplier_id: Option<Uuid>,
    pub barcode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_perishable: Option<bool>,
    pub shelf_life_days: Option<i32>,
    pub unit_cost: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub holding_cost_per_unit_per_day: Option<Decimal>,
    pub primary_supplier_id: Option<Uuid>,
    pub barcode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProductSearchFilters {
    pub query: Option<String>,
    pub category_id: Option<Uuid>,
    pub lifecycle_state: Option<ProductLifecycleState>,
    pub supplier_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub lifecycle_state: ProductLifecycleState,
    pub unit_price: Decimal,
    pub category_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lifecycle_state_is_pending_activation_and_ineligible() {
        let p = Product::new(Uuid::new_v4(), "SKU1".into(), "Widget".into(), Uuid::new_v4());
        assert_eq!(p.lifecycle_state, ProductLifecycleState::PendingActivation);
        assert!(!p.is_replenishment_eligible());
    }

    #[test]
    fn active_product_is_replenishment_eligible() {
        let mut p = Product::new(Uuid::new_v4(), "SKU1".into(), "Widget".into(), Uuid::new_v4());
        p.lifecycle_state = ProductLifecycleState::Active;
        assert!(p.is_replenishment_eligible());
    }

    #[test]
    fn effective_holding_cost_falls_back_to_quarter_unit_cost_per_year() {
        let mut p = Product::new(Uuid::new_v4(), "SKU1".into(), "Widget".into(), Uuid::new_v4());
        p.unit_cost = Decimal::new(3650, 2); // 36.50
        assert_eq!(
            p.effective_holding_cost_per_unit_per_day(),
            Decimal::new(3650, 2) * Decimal::new(25, 2) / Decimal::from(365)
        );
    }
}
