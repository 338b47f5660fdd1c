//! Spec-exact inventory entities: `InventoryLevel`, `ProductSourcingRule`,
//! `ReorderPoint`, `ReorderHistory`.
//!
//! Grounded on `examples/original_source/backend/db/models.py`'s
//! `InventoryLevel`/`ProductSourcingRule`/`ReorderPoint`/`ReorderHistory`
//! tables and the teacher's `FromRow` struct + builder idiom used throughout
//! `supplier/model.rs` and `product/model.rs`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A point-in-time snapshot of on-hand/on-order/reserved/available stock for
/// a (store, product) pair. Append-only: a new row is written on every sync
/// rather than mutating a prior snapshot (spec.md §3 InventoryLevel).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryLevel {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub quantity_on_hand: i32,
    pub quantity_on_order: i32,
    pub quantity_reserved: i32,
    pub quantity_available: i32,
    pub source: String,
}

impl InventoryLevel {
    pub fn new(
        tenant_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        quantity_on_hand: i32,
        quantity_on_order: i32,
        quantity_reserved: i32,
        source: impl Into<String>,
    ) -> Self {
        let quantity_available = (quantity_on_hand - quantity_reserved).max(0);
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            store_id,
            product_id,
            timestamp: Utc::now(),
            quantity_on_hand: quantity_on_hand.max(0),
            quantity_on_order,
            quantity_reserved,
            quantity_available,
            source: source.into(),
        }
    }

    /// `on_hand >= 0` invariant from spec.md §3.
    pub fn is_valid(&self) -> bool {
        self.quantity_on_hand >= 0
    }
}

/// Where a product is sourced from. spec.md §3 ProductSourcingRule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sourcing_source_type", rename_all = "snake_case")]
pub enum SourceType {
    VendorDirect,
    Dc,
    RegionalDc,
    Transfer,
}

/// Ordered (priority 1..5) mapping from (product, optional store) to a
/// sourcing strategy. A null `store_id` applies to every store for that
/// product, per the teacher's original `ProductSourcingRule.store_id`
/// nullable-means-all-stores convention.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductSourcingRule {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub store_id: Option<Uuid>,
    pub source_type: SourceType,
    /// supplier_id when `source_type = VendorDirect`, DC id otherwise.
    pub source_id: Uuid,
    pub source_name: String,
    pub lead_time_mean_days: f64,
    pub lead_time_variance: f64,
    pub min_order_qty: i32,
    pub cost_per_order: Decimal,
    pub priority: i16,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductSourcingRule {
    pub fn new(
        tenant_id: Uuid,
        product_id: Uuid,
        store_id: Option<Uuid>,
        source_type: SourceType,
        source_id: Uuid,
        source_name: impl Into<String>,
        lead_time_mean_days: f64,
        priority: i16,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            product_id,
            store_id,
            source_type,
            source_id,
            source_name: source_name.into(),
            lead_time_mean_days,
            lead_time_variance: 0.0,
            min_order_qty: 1,
            cost_per_order: Decimal::ZERO,
            priority: priority.clamp(1, 5),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies to the given store: either scoped to it directly, or a
    /// store-agnostic (`store_id = None`) rule.
    pub fn applies_to(&self, store_id: Uuid) -> bool {
        self.active && self.store_id.map_or(true, |s| s == store_id)
    }
}

/// Current reorder point, safety stock, and EOQ for a (store, product) pair.
/// Mutated only by the replenishment optimizer (spec.md §4.H); prior state is
/// always copied to `ReorderHistory` first.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReorderPoint {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub reorder_point: i32,
    pub safety_stock: i32,
    pub economic_order_qty: i32,
    pub lead_time_days: i32,
    pub service_level: f64,
    pub last_calculated: DateTime<Utc>,
}

impl ReorderPoint {
    pub fn new(
        tenant_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        reorder_point: i32,
        safety_stock: i32,
        economic_order_qty: i32,
        lead_time_days: i32,
        service_level: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            store_id,
            product_id,
            reorder_point,
            safety_stock,
            economic_order_qty,
            lead_time_days,
            service_level,
            last_calculated: Utc::now(),
        }
    }

    /// Percent change vs a proposed new reorder point, used by the optimizer
    /// to decide whether an update clears the write threshold (default 10%,
    /// spec.md §4.H step 8).
    pub fn percent_change(&self, new_reorder_point: i32) -> f64 {
        let denom = self.reorder_point.max(1) as f64;
        ((new_reorder_point - self.reorder_point).abs() as f64) / denom
    }
}

/// Audit trail entry written every time the optimizer recalculates a ROP.
/// `calculation_rationale` holds the full breakdown (demand, lead time,
/// z-score, reliability/cluster multipliers) for operator inspection.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReorderHistory {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub old_reorder_point: i32,
    pub new_reorder_point: i32,
    pub old_safety_stock: i32,
    pub new_safety_stock: i32,
    pub old_eoq: i32,
    pub new_eoq: i32,
    pub calculation_rationale: Json,
    pub calculated_at: DateTime<Utc>,
}

impl ReorderHistory {
    pub fn new(
        tenant_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        old: &ReorderPoint,
        new_reorder_point: i32,
        new_safety_stock: i32,
        new_eoq: i32,
        calculation_rationale: Json,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            store_id,
            product_id,
            old_reorder_point: old.reorder_point,
            new_reorder_point,
            old_safety_stock: old.safety_stock,
            new_safety_stock,
            old_eoq: old.economic_order_qty,
            new_eoq,
            calculation_rationale,
            calculated_at: Utc::now(),
        }
    }

    /// History entry for a brand-new ROP (no prior state), old values zeroed
    /// out as the original Python implementation does.
    pub fn for_creation(
        tenant_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        new_reorder_point: i32,
        new_safety_stock: i32,
        new_eoq: i32,
        calculation_rationale: Json,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            store_id,
            product_id,
            old_reorder_point: 0,
            new_reorder_point,
            old_safety_stock: 0,
            new_safety_stock,
            old_eoq: 0,
            new_eoq,
            calculation_rationale,
            calculated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_level_clamps_available_at_zero() {
        let level = InventoryLevel::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 5, 0, 10, "pos");
        assert_eq!(level.quantity_available, 0);
        assert!(level.is_valid());
    }

    #[test]
    fn sourcing_rule_applies_to_matches_store_or_wildcard() {
        let tenant = Uuid::new_v4();
        let product = Uuid::new_v4();
        let store_a = Uuid::new_v4();
        let store_b = Uuid::new_v4();

        let scoped = ProductSourcingRule::new(
            tenant, product, Some(store_a), SourceType::Dc, Uuid::new_v4(), "DC1", 2.0, 1,
        );
        assert!(scoped.applies_to(store_a));
        assert!(!scoped.applies_to(store_b));

        let wildcard = ProductSourcingRule::new(
            tenant, product, None, SourceType::VendorDirect, Uuid::new_v4(), "Acme", 10.0, 2,
        );
        assert!(wildcard.applies_to(store_a));
        assert!(wildcard.applies_to(store_b));
    }

    #[test]
    fn reorder_point_percent_change_uses_floor_of_one() {
        let rp = ReorderPoint::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 0, 0, 1, 5, 0.95);
        assert_eq!(rp.percent_change(2), 2.0);
    }
}
