use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use storefront_infra::projections::{CartReadModel, OrderReadModel};

use crate::app::services::AppServices;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpsertCartRequest {
    pub items: Vec<CartItemRequest>,
    /// `false` merges into existing quantities, `true` sets them absolutely.
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    /// Major units (e.g. `12.50`); converted to cents at the boundary.
    pub price: f64,
    pub stock: u32,
    pub kind: Option<String>,
    pub thumbnail: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

/// Cart view joined with current catalog details.
///
/// The catalog join is presentational; quantities come from the cart read
/// model. A product that no longer resolves renders with null details.
pub fn cart_to_json(cart: &CartReadModel, services: &AppServices) -> JsonValue {
    let items: Vec<JsonValue> = cart
        .lines
        .iter()
        .map(|line| {
            let product = services.find_product(&line.product_id);
            json!({
                "product_id": line.product_id.to_string(),
                "quantity": line.quantity,
                "name": product.as_ref().map(|p| p.name.clone()),
                "unit_price": product.as_ref().map(|p| p.unit_price.minor()),
                "kind": product.as_ref().and_then(|p| p.kind.clone()),
                "thumbnail": product.as_ref().and_then(|p| p.thumbnail.clone()),
            })
        })
        .collect();

    json!({
        "cart_id": cart.cart_id.to_string(),
        "user_id": cart.user_id.to_string(),
        "items": items,
    })
}

/// Order view with the owner's email joined in.
///
/// Line names and prices are the order's own snapshots, not current catalog
/// state.
pub fn order_to_json(order: &OrderReadModel, email: Option<String>) -> JsonValue {
    let lines: Vec<JsonValue> = order
        .lines
        .iter()
        .map(|line| {
            json!({
                "product_id": line.product_id.to_string(),
                "product_name": line.product_name,
                "quantity": line.quantity,
                "unit_price": line.unit_price.minor(),
            })
        })
        .collect();

    json!({
        "id": order.order_id.to_string(),
        "user_id": order.user_id.to_string(),
        "email": email,
        "status": order.status,
        "lines": lines,
        "total": order.total.minor(),
        "total_display": order.total.to_string(),
        "shipping_address": order.shipping_address,
        "placed_at": order.placed_at.to_rfc3339(),
    })
}
