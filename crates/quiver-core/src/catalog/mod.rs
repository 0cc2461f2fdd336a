//! Catalog persistence.

pub mod store;

pub use store::{CatalogInfo, CatalogStore};
