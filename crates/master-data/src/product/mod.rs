pub mod model;
pub mod repository;
pub mod service;

pub use model::{
    CreateProductRequest, Product, ProductCategory, ProductLifecycleState, ProductSearchFilters,
    ProductSummary, UpdateProductRequest,
};
pub use repository::{PostgresProductRepository, ProductRepository};
pub use service::{DefaultProductService, ProductService};
