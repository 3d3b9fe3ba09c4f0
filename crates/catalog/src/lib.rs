//! Read-only product catalog access.
//!
//! The catalog is an external collaborator of the checkout pipeline: the core
//! only reads point-in-time snapshots of price, name, and stock through the
//! [`CatalogReader`] seam. Nothing in this crate is event-sourced.

pub mod product;

pub use product::{CatalogReader, InMemoryCatalog, ProductId, ProductSnapshot};
