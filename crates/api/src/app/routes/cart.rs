use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use storefront_catalog::ProductId;
use storefront_core::AggregateId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_cart).post(upsert_cart))
        .route("/:product_id", axum::routing::put(set_quantity).delete(remove_line))
}

fn parse_product_id(id: &str) -> Result<ProductId, axum::response::Response> {
    id.parse::<AggregateId>().map(ProductId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id")
    })
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    match services.cart_view(user.user_id()) {
        Some(cart) => Json(dto::cart_to_json(&cart, &services)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "cart not found"),
    }
}

pub async fn upsert_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<dto::UpsertCartRequest>,
) -> axum::response::Response {
    let mut items = Vec::with_capacity(body.items.len());
    for item in &body.items {
        let product_id = match parse_product_id(&item.product_id) {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        items.push((product_id, item.quantity));
    }

    match services.upsert_cart(user.user_id(), items, body.replace) {
        Ok(cart) => Json(dto::cart_to_json(&cart, &services)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn set_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetQuantityRequest>,
) -> axum::response::Response {
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.upsert_cart(user.user_id(), vec![(product_id, body.quantity)], true) {
        Ok(cart) => Json(dto::cart_to_json(&cart, &services)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn remove_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.remove_cart_line(user.user_id(), product_id) {
        Ok(cart) => Json(dto::cart_to_json(&cart, &services)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
