//! `defter-products` — product catalog domain.

pub mod product;

pub use product::{Product, ProductCreate, ProductId, ProductPatch, Sku};
