//! Order compilation: turn cart lines into priced, snapshotted order lines.
//!
//! Pure function over explicit inputs. The caller fetches the product
//! snapshots; pricing happens entirely in minor units and in the order the
//! lines were supplied, so a given input always produces the same total.

use std::collections::HashMap;

use storefront_cart::CartLine;
use storefront_catalog::{ProductId, ProductSnapshot};
use storefront_core::{DomainError, Money};

use crate::order::OrderLine;

/// Result of compiling cart lines against catalog snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLines {
    pub lines: Vec<OrderLine>,
    pub total: Money,
}

/// Price a set of cart lines against product snapshots.
///
/// Fails without producing anything when:
/// - the line set is empty or a quantity is zero (validation);
/// - a product id does not resolve in `products` (`ProductNotFound`);
/// - the total overflows the minor-unit range.
pub fn price_lines(
    cart_lines: &[CartLine],
    products: &HashMap<ProductId, ProductSnapshot>,
) -> Result<PricedLines, DomainError> {
    if cart_lines.is_empty() {
        return Err(DomainError::validation("cannot compile an order from an empty cart"));
    }

    let mut lines = Vec::with_capacity(cart_lines.len());
    let mut total = Money::ZERO;

    for cart_line in cart_lines {
        if cart_line.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let product = products
            .get(&cart_line.product_id)
            .ok_or_else(|| DomainError::product_not_found(cart_line.product_id.to_string()))?;

        let line = OrderLine {
            product_id: cart_line.product_id,
            quantity: cart_line.quantity,
            unit_price: product.unit_price,
            product_name: product.name.clone(),
        };

        let line_total = line
            .line_total()
            .ok_or_else(|| DomainError::validation("order total out of range"))?;
        total = total
            .checked_add(line_total)
            .ok_or_else(|| DomainError::validation("order total out of range"))?;

        lines.push(line);
    }

    Ok(PricedLines { lines, total })
}
