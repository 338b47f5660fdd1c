pub mod model;
pub mod repository;
pub mod service;

pub use model::{
    PaymentTerms, Supplier, SupplierAddress, SupplierCategory, SupplierContact, SupplierStatus,
};
pub use repository::{PostgresSupplierRepository, SupplierRepository};
pub use service::{DefaultSupplierService, SupplierService};
