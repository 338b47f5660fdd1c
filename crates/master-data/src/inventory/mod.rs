//! Inventory snapshots, sourcing rules, and the replenishment optimizer.
//!
//! spec.md §3/§4.H: `InventoryLevel` is an append-only per-(store, product)
//! stock snapshot; `ProductSourcingRule`/`ReorderPoint`/`ReorderHistory`
//! drive the dynamic reorder-point calculation in `optimization`.

pub mod model;
pub mod optimization;
pub mod repository;
pub mod service;

pub use model::{InventoryLevel, ProductSourcingRule, ReorderHistory, ReorderPoint, SourceType};

pub use repository::{
    InventoryLevelRepository, PostgresInventoryLevelRepository, PostgresReorderPointRepository,
    PostgresSourcingRuleRepository, ReorderPointRepository, SourcingRuleRepository,
};

pub use service::{InventoryLevelService, ReorderPointService, SourcingRuleService};

pub use optimization::{
    ForecastDemandSource, InventoryOptimizer, OptimizationOutcome, ReorderCalculation, ResolvedSourcing,
};
