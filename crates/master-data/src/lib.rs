//! Master data: products, suppliers, stores, and per-store inventory state.
//!
//! Grounded on spec.md §3 (core entities) and §4.H (replenishment
//! optimizer, in `inventory::optimization`).

pub mod supplier;
pub mod product;
pub mod inventory;
pub mod location;

// Common types and utilities
pub mod types;
pub mod error;

pub use inventory::{
    InventoryLevel, InventoryLevelService, InventoryOptimizer, OptimizationOutcome, ProductSourcingRule,
    ReorderCalculation, ReorderHistory, ReorderPoint, ReorderPointService, SourceType, SourcingRuleService,
};

pub use location::{PostgresStoreRepository, Store, StoreRepository, StoreService, StoreStatus};

pub use product::{
    CreateProductRequest, Product, ProductCategory, ProductLifecycleState, ProductRepository,
    ProductSearchFilters, ProductSummary, ProductService, PostgresProductRepository,
    UpdateProductRequest,
};

pub use supplier::{
    PaymentTerms, Supplier, SupplierAddress, SupplierCategory, SupplierContact, SupplierStatus,
};

pub use error::{MasterDataError, Result};
pub use types::*;