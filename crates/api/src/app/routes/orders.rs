use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use storefront_core::AggregateId;
use storefront_orders::OrderId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(place_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/session", post(create_session))
}

fn parse_order_id(id: &str) -> Result<OrderId, axum::response::Response> {
    id.parse::<AggregateId>().map(OrderId::new).map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id")
    })
}

pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    match services.place_order(user.user_id()) {
        Ok(order) => {
            let email = services.user_email(user.user_id());
            (StatusCode::CREATED, Json(dto::order_to_json(&order, email))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    let email = services.user_email(user.user_id());
    let orders: Vec<_> = services
        .list_orders(user.user_id())
        .iter()
        .map(|order| dto::order_to_json(order, email.clone()))
        .collect();
    Json(orders).into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.get_order(user.user_id(), order_id) {
        Some(order) => {
            let email = services.user_email(user.user_id());
            Json(dto::order_to_json(&order, email)).into_response()
        }
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
}

pub async fn create_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.create_session(user.user_id(), order_id) {
        Ok(session) => (StatusCode::CREATED, Json(session)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
