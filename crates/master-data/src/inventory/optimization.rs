//! Replenishment optimizer: reorder point, safety stock, and EOQ.
//!
//! Implements spec.md §4.H exactly. Grounded on
//! `examples/original_source/backend/inventory/optimizer.py` for the
//! constant tables (`Z_SCORES`, `RELIABILITY_MULTIPLIERS`) and the combined
//! safety-stock formula; the teacher's own `optimization.rs` was a more
//! generic/ML-flavored inventory-optimization surface that this file
//! replaces with the spec's exact calculation.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;
use shelfops_core::database::DatabasePool;
use shelfops_core::TenantContext;
use uuid::Uuid;

use super::model::{ProductSourcingRule, ReorderHistory, ReorderPoint, SourceType};
use crate::error::{MasterDataError, Result};
use crate::product::model::Product;
use crate::supplier::model::Supplier;

/// Service level → Z-score (standard normal distribution), spec.md §4.H step 4.
const Z_SCORES: [(f64, f64); 4] = [(0.90, 1.282), (0.95, 1.645), (0.975, 1.960), (0.99, 2.326)];

/// Vendor on-time rate → safety-stock multiplier, spec.md §4.H step 3.
/// `(low, high)` is a half-open interval `[low, high)`; the top bracket is
/// closed at 1.01 so a perfect 1.0 on-time rate still maps to 1.0.
const RELIABILITY_BRACKETS: [((f64, f64), f64); 4] = [
    ((0.95, 1.01), 1.0),
    ((0.80, 0.95), 1.2),
    ((0.60, 0.80), 1.5),
    ((0.00, 0.60), 1.8),
];

/// Cluster tier → safety-stock multiplier, spec.md §4.H step 5.
pub fn cluster_multiplier(cluster_tier: i16) -> f64 {
    match cluster_tier {
        0 => 1.15,
        2 => 0.85,
        _ => 1.00,
    }
}

pub fn reliability_multiplier(on_time_rate: f64) -> f64 {
    for ((low, high), multiplier) in RELIABILITY_BRACKETS {
        if on_time_rate >= low && on_time_rate < high {
            return multiplier;
        }
    }
    1.0
}

/// Closest Z-score for a requested service level, spec.md §4.H step 4.
pub fn z_score_for_service_level(service_level: f64) -> f64 {
    Z_SCORES
        .iter()
        .min_by(|(a, _), (b, _)| {
            (a - service_level)
                .abs()
                .partial_cmp(&(b - service_level).abs())
                .unwrap()
        })
        .map(|(_, z)| *z)
        .unwrap_or(1.645)
}

/// Wilson EOQ, spec.md §4.H step 7. Returns 1 whenever any input is
/// non-positive (no calculation possible).
pub fn economic_order_quantity(annual_demand: f64, cost_per_order: f64, annual_holding_cost: f64) -> i32 {
    if annual_demand <= 0.0 || cost_per_order <= 0.0 || annual_holding_cost <= 0.0 {
        return 1;
    }
    let eoq = ((2.0 * annual_demand * cost_per_order) / annual_holding_cost).sqrt();
    eoq.ceil().max(1.0) as i32
}

/// Resolves average/stddev of next-`horizon_days`-day forecast demand for a
/// (store, product) pair. Implemented by the `forecasting` crate's forecast
/// repository; kept as a trait here so `master-data` never depends on
/// `forecasting` (avoids a dependency cycle — the optimizer is consumed by
/// `scheduler`, which wires both crates together).
#[async_trait]
pub trait ForecastDemandSource: Send + Sync {
    /// Returns `None` when no forecast rows exist for the pair (spec.md §4.H
    /// step 1: "if absent, skip — no calculation").
    async fn avg_and_stddev(
        &self,
        tenant: &TenantContext,
        store_id: Uuid,
        product_id: Uuid,
        horizon_days: i32,
    ) -> shelfops_core::Result<Option<(f64, f64)>>;
}

/// Resolved sourcing strategy for a (store, product) pair, after consulting
/// `ProductSourcingRule` priority order with a supplier-lead-time fallback
/// (spec.md §4.H step 2).
#[derive(Debug, Clone)]
pub struct ResolvedSourcing {
    pub source_type: SourceType,
    pub source_name: String,
    pub lead_time_mean_days: f64,
    pub lead_time_variance: f64,
    pub min_order_qty: i32,
    pub cost_per_order: f64,
    pub vendor_on_time_rate: f64,
}

/// Full breakdown of one ROP/EOQ/SS calculation, persisted verbatim into
/// `ReorderHistory.calculation_rationale`.
#[derive(Debug, Clone)]
pub struct ReorderCalculation {
    pub reorder_point: i32,
    pub safety_stock: i32,
    pub economic_order_qty: i32,
    pub lead_time_days: f64,
    pub avg_daily_demand: f64,
    pub demand_std_dev: f64,
    pub sourcing: ResolvedSourcing,
    pub service_level: f64,
    pub z_score: f64,
    pub reliability_multiplier: f64,
    pub cluster_tier: i16,
    pub cluster_multiplier: f64,
}

impl ReorderCalculation {
    pub fn rationale(&self) -> serde_json::Value {
        json!({
            "source_type": format!("{:?}", self.sourcing.source_type),
            "source_name": self.sourcing.source_name,
            "lead_time_days": self.lead_time_days,
            "lead_time_variance": self.sourcing.lead_time_variance,
            "avg_daily_demand": round2(self.avg_daily_demand),
            "demand_std_dev": round2(self.demand_std_dev),
            "service_level": self.service_level,
            "z_score": self.z_score,
            "vendor_reliability": self.sourcing.vendor_on_time_rate,
            "reliability_multiplier": self.reliability_multiplier,
            "cluster_tier": self.cluster_tier,
            "cluster_multiplier": self.cluster_multiplier,
            "min_order_qty": self.sourcing.min_order_qty,
            "cost_per_order": self.sourcing.cost_per_order,
        })
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Outcome of `optimize_store_product`: either a fresh ROP was created, an
/// existing one was updated (change exceeded threshold), or nothing changed.
#[derive(Debug, Clone)]
pub enum OptimizationOutcome {
    Created(ReorderPoint),
    Updated { old: ReorderPoint, new: ReorderPoint },
    NoChange { current: ReorderPoint },
    Skipped { reason: String },
}

pub struct InventoryOptimizer<F: ForecastDemandSource> {
    db: DatabasePool,
    reorder_repo: std::sync::Arc<dyn super::repository::ReorderPointRepository>,
    forecast_source: F,
}

impl<F: ForecastDemandSource> InventoryOptimizer<F> {
    pub fn new(
        db: DatabasePool,
        reorder_repo: std::sync::Arc<dyn super::repository::ReorderPointRepository>,
        forecast_source: F,
    ) -> Self {
        Self { db, reorder_repo, forecast_source }
    }

    /// Resolves `ProductSourcingRule`s for (store, product) in priority
    /// order, falling back to the product's primary supplier's lead time
    /// when no rule exists (spec.md §4.H step 2).
    async fn resolve_sourcing(
        &self,
        tenant: &TenantContext,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<ResolvedSourcing> {
        let pool = self.db.get_tenant_pool(tenant).await?;

        let mut rules = sqlx::query_as::<_, ProductSourcingRule>(
            "SELECT * FROM product_sourcing_rules WHERE product_id = $1 AND active = true ORDER BY priority ASC",
        )
        .bind(product_id)
        .fetch_all(pool.get())
        .await?;
        rules.retain(|r| r.applies_to(store_id));

        if let Some(rule) = rules.into_iter().next() {
            let on_time_rate = if rule.source_type == SourceType::VendorDirect {
                self.supplier_on_time_rate(tenant, rule.source_id).await?
            } else {
                0.95
            };
            return Ok(ResolvedSourcing {
                source_type: rule.source_type,
                source_name: rule.source_name,
                lead_time_mean_days: rule.lead_time_mean_days,
                lead_time_variance: rule.lead_time_variance,
                min_order_qty: rule.min_order_qty,
                cost_per_order: rule.cost_per_order.to_f64().unwrap_or(0.0),
                vendor_on_time_rate: on_time_rate,
            });
        }

        // Fallback: product's primary supplier.
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(pool.get())
            .await?
            .ok_or_else(|| MasterDataError::ProductNotFound { id: product_id.to_string() })?;

        let supplier = match product.primary_supplier_id {
            Some(supplier_id) => sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = $1")
                .bind(supplier_id)
                .fetch_optional(pool.get())
                .await?,
            None => None,
        };

        match supplier {
            Some(s) => Ok(ResolvedSourcing {
                source_type: SourceType::VendorDirect,
                source_name: s.display_name().to_string(),
                lead_time_mean_days: s.actual_lead_time_mean_days.or(s.lead_time_days.map(|d| d as f64)).unwrap_or(7.0),
                lead_time_variance: s.actual_lead_time_variance.unwrap_or(1.0),
                min_order_qty: 1,
                cost_per_order: s.cost_per_order.and_then(|d| d.to_f64()).unwrap_or(50.0),
                vendor_on_time_rate: s.on_time_delivery_rate.unwrap_or(0.95),
            }),
            None => Ok(ResolvedSourcing {
                source_type: SourceType::VendorDirect,
                source_name: "unknown".to_string(),
                lead_time_mean_days: 7.0,
                lead_time_variance: 1.0,
                min_order_qty: 1,
                cost_per_order: 50.0,
                vendor_on_time_rate: 0.95,
            }),
        }
    }

    async fn supplier_on_time_rate(&self, tenant: &TenantContext, supplier_id: Uuid) -> Result<f64> {
        let pool = self.db.get_tenant_pool(tenant).await?;
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = $1")
            .bind(supplier_id)
            .fetch_optional(pool.get())
            .await?;
        Ok(supplier.and_then(|s| s.on_time_delivery_rate).unwrap_or(0.95))
    }

    async fn cluster_tier_for_store(&self, tenant: &TenantContext, store_id: Uuid) -> Result<i16> {
        let pool = self.db.get_tenant_pool(tenant).await?;
        let tier: Option<i16> =
            sqlx::query_scalar::<_, Option<i16>>("SELECT cluster_tier FROM stores WHERE id = $1")
                .bind(store_id)
                .fetch_optional(pool.get())
                .await?
                .flatten();
        Ok(tier.unwrap_or(1))
    }

    /// Computes ROP/SS/EOQ for a (store, product) pair per spec.md §4.H,
    /// steps 1-7. Returns `Ok(None)` when no forecast exists (step 1: skip,
    /// no calculation — this is `DataUnavailable`, not an error).
    pub async fn calculate_dynamic_reorder_point(
        &self,
        tenant: &TenantContext,
        store_id: Uuid,
        product_id: Uuid,
        forecast_horizon_days: i32,
        service_level: f64,
    ) -> Result<Option<ReorderCalculation>> {
        let demand = self
            .forecast_source
            .avg_and_stddev(tenant, store_id, product_id, forecast_horizon_days)
            .await
            .map_err(MasterDataError::Core)?;
        let Some((avg_daily_demand, demand_std_dev)) = demand else {
            return Ok(None);
        };
        let avg_daily_demand = avg_daily_demand.max(0.01);
        let demand_std_dev = demand_std_dev.max(0.01);

        let sourcing = self.resolve_sourcing(tenant, store_id, product_id).await?;
        let lead_time = sourcing.lead_time_mean_days;
        let lead_time_var = sourcing.lead_time_variance;

        let reliability_mult = reliability_multiplier(sourcing.vendor_on_time_rate);
        let z_score = z_score_for_service_level(service_level);

        // SS = Z x sqrt( LT x sigma_demand^2 + D^2 x sigma_LT^2 ) x reliability x cluster
        let demand_component = lead_time * demand_std_dev.powi(2);
        let leadtime_component = avg_daily_demand.powi(2) * lead_time_var;
        let combined_std = (demand_component + leadtime_component).sqrt();

        let cluster_tier = self.cluster_tier_for_store(tenant, store_id).await?;
        let cluster_mult = cluster_multiplier(cluster_tier);

        let safety_stock = ((z_score * combined_std * reliability_mult * cluster_mult).ceil() as i32).max(1);
        let reorder_point = ((avg_daily_demand * lead_time + safety_stock as f64).ceil() as i32).max(1);

        let pool = self.db.get_tenant_pool(tenant).await?;
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(pool.get())
            .await?
            .ok_or_else(|| MasterDataError::ProductNotFound { id: product_id.to_string() })?;

        let holding_cost_annual = product
            .holding_cost_per_unit_per_day
            .map(|d| d.to_f64().unwrap_or(0.0) * 365.0)
            .unwrap_or_else(|| {
                let unit_cost = product.unit_cost.to_f64().unwrap_or(0.0);
                if unit_cost > 0.0 { unit_cost * 0.25 } else { 5.0 }
            });

        let annual_demand = avg_daily_demand * 365.0;
        let eoq = economic_order_quantity(annual_demand, sourcing.cost_per_order, holding_cost_annual)
            .max(sourcing.min_order_qty);

        Ok(Some(ReorderCalculation {
            reorder_point,
            safety_stock,
            economic_order_qty: eoq,
            lead_time_days: lead_time,
            avg_daily_demand,
            demand_std_dev,
            sourcing,
            service_level,
            z_score,
            reliability_multiplier: reliability_mult,
            cluster_tier,
            cluster_multiplier: cluster_mult,
        }))
    }

    /// Recalculates and, if the change clears `change_threshold_pct` (default
    /// 0.10), persists a new `ReorderPoint` + `ReorderHistory` row
    /// (spec.md §4.H step 8). Returns the outcome without raising — a
    /// below-threshold change or missing forecast is not an error.
    pub async fn optimize_store_product(
        &self,
        tenant: &TenantContext,
        store_id: Uuid,
        product_id: Uuid,
        change_threshold_pct: f64,
    ) -> Result<OptimizationOutcome> {
        let calc = match self
            .calculate_dynamic_reorder_point(tenant, store_id, product_id, 14, 0.95)
            .await?
        {
            Some(c) => c,
            None => {
                return Ok(OptimizationOutcome::Skipped {
                    reason: "no forecast available for horizon".to_string(),
                })
            }
        };

        let current = self.reorder_repo.get(tenant, store_id, product_id).await?;

        let rationale = calc.rationale();

        match current {
            None => {
                let new_rp = ReorderPoint::new(
                    tenant.tenant_id.0,
                    store_id,
                    product_id,
                    calc.reorder_point,
                    calc.safety_stock,
                    calc.economic_order_qty,
                    calc.lead_time_days.round() as i32,
                    calc.service_level,
                );
                let history = ReorderHistory::for_creation(
                    tenant.tenant_id.0,
                    store_id,
                    product_id,
                    calc.reorder_point,
                    calc.safety_stock,
                    calc.economic_order_qty,
                    rationale,
                );
                self.reorder_repo.upsert_with_history(tenant, &new_rp, &history, true).await?;
                Ok(OptimizationOutcome::Created(new_rp))
            }
            Some(existing) => {
                let pct_change = existing.percent_change(calc.reorder_point);
                if pct_change < change_threshold_pct {
                    return Ok(OptimizationOutcome::NoChange { current: existing });
                }

                let history = ReorderHistory::new(
                    tenant.tenant_id.0,
                    store_id,
                    product_id,
                    &existing,
                    calc.reorder_point,
                    calc.safety_stock,
                    calc.economic_order_qty,
                    rationale,
                );

                let mut updated = existing.clone();
                updated.reorder_point = calc.reorder_point;
                updated.safety_stock = calc.safety_stock;
                updated.economic_order_qty = calc.economic_order_qty;
                updated.lead_time_days = calc.lead_time_days.round() as i32;
                updated.last_calculated = Utc::now();

                self.reorder_repo.upsert_with_history(tenant, &updated, &history, false).await?;
                Ok(OptimizationOutcome::Updated { old: existing, new: updated })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reliability_multiplier_matches_spec_brackets() {
        assert_eq!(reliability_multiplier(0.99), 1.0);
        assert_eq!(reliability_multiplier(0.95), 1.0);
        assert_eq!(reliability_multiplier(0.94), 1.2);
        assert_eq!(reliability_multiplier(0.80), 1.2);
        assert_eq!(reliability_multiplier(0.79), 1.5);
        assert_eq!(reliability_multiplier(0.60), 1.5);
        assert_eq!(reliability_multiplier(0.59), 1.8);
        assert_eq!(reliability_multiplier(0.0), 1.8);
    }

    #[test]
    fn z_score_picks_closest_bracket() {
        assert_eq!(z_score_for_service_level(0.95), 1.645);
        assert_eq!(z_score_for_service_level(0.96), 1.645);
        assert_eq!(z_score_for_service_level(0.98), 1.960);
        assert_eq!(z_score_for_service_level(0.999), 2.326);
    }

    #[test]
    fn eoq_is_at_least_one_whenever_inputs_are_nonpositive() {
        assert_eq!(economic_order_quantity(0.0, 50.0, 10.0), 1);
        assert_eq!(economic_order_quantity(100.0, 0.0, 10.0), 1);
        assert_eq!(economic_order_quantity(100.0, 50.0, 0.0), 1);
    }

    #[test]
    fn eoq_matches_wilson_formula() {
        // D=1000/yr, S=$50, H=$2 -> sqrt(2*1000*50/2) = sqrt(50000) ~= 223.6
        let eoq = economic_order_quantity(1000.0, 50.0, 2.0);
        assert_eq!(eoq, 224);
    }

    #[test]
    fn cluster_multiplier_matches_spec_table() {
        assert_eq!(cluster_multiplier(0), 1.15);
        assert_eq!(cluster_multiplier(1), 1.00);
        assert_eq!(cluster_multiplier(2), 0.85);
        assert_eq!(cluster_multiplier(9), 1.00);
    }
}
