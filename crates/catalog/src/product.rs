use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use storefront_core::{AggregateId, Money};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Point-in-time view of a product as the checkout pipeline sees it.
///
/// `name` and `unit_price` are what order compilation snapshots; `stock` is
/// what cart mutations are validated against. `kind` and `thumbnail` are
/// presentation metadata joined into cart views, not part of the correctness
/// contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub stock: u32,
    pub kind: Option<String>,
    pub thumbnail: Option<String>,
}

/// Read-only lookup of product state by identifier.
///
/// A `None` result means the product no longer resolves; callers translate
/// that into `ProductNotFound` and abort the whole operation.
pub trait CatalogReader: Send + Sync {
    fn find_product(&self, id: &ProductId) -> Option<ProductSnapshot>;
}

impl<C> CatalogReader for Arc<C>
where
    C: CatalogReader + ?Sized,
{
    fn find_product(&self, id: &ProductId) -> Option<ProductSnapshot> {
        (**self).find_product(id)
    }
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<HashMap<ProductId, ProductSnapshot>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, product: ProductSnapshot) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(product.id, product);
        }
    }

    pub fn set_stock(&self, id: &ProductId, stock: u32) {
        if let Ok(mut map) = self.inner.write() {
            if let Some(p) = map.get_mut(id) {
                p.stock = stock;
            }
        }
    }

    pub fn remove(&self, id: &ProductId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(id);
        }
    }

    pub fn list(&self) -> Vec<ProductSnapshot> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }
}

impl CatalogReader for InMemoryCatalog {
    fn find_product(&self, id: &ProductId) -> Option<ProductSnapshot> {
        let map = self.inner.read().ok()?;
        map.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(stock: u32) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(AggregateId::new()),
            name: "widget".to_string(),
            unit_price: Money::from_minor(1250),
            stock,
            kind: None,
            thumbnail: None,
        }
    }

    #[test]
    fn find_returns_latest_snapshot() {
        let catalog = InMemoryCatalog::new();
        let p = snapshot(3);
        let id = p.id;
        catalog.upsert(p.clone());

        assert_eq!(catalog.find_product(&id), Some(p));

        catalog.set_stock(&id, 0);
        assert_eq!(catalog.find_product(&id).unwrap().stock, 0);
    }

    #[test]
    fn missing_product_resolves_to_none() {
        let catalog = InMemoryCatalog::new();
        let p = snapshot(1);
        let id = p.id;
        catalog.upsert(p);
        catalog.remove(&id);

        assert!(catalog.find_product(&id).is_none());
    }
}
