use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use serde_json::json;

use storefront_checkout::parse_event;
use storefront_infra::reconciler::{ReconcileError, ReconcileOutcome};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/payment", post(payment_webhook))
}

/// Signed payment webhook (not behind user auth).
///
/// Unverifiable deliveries are rejected before touching any state. A
/// processing failure returns non-success so the provider's redelivery
/// drives the retry.
pub async fn payment_webhook(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let Some(signature) = headers.get("stripe-signature").and_then(|v| v.to_str().ok()) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "unverified_event",
            "missing signature header",
        );
    };

    if let Err(e) = services.verify_webhook(&body, signature) {
        tracing::warn!(error = %e, "rejected webhook delivery");
        return errors::json_error(StatusCode::BAD_REQUEST, "unverified_event", e.to_string());
    }

    let event = match parse_event(&body) {
        Ok(event) => event,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "malformed_event", e.to_string());
        }
    };

    match services.reconcile_payment(&event) {
        Ok(ReconcileOutcome::Settled) => Json(json!({"status": "settled"})).into_response(),
        Ok(ReconcileOutcome::AlreadySettled) => {
            Json(json!({"status": "already_settled"})).into_response()
        }
        Ok(ReconcileOutcome::Ignored) => Json(json!({"status": "ignored"})).into_response(),
        Err(ReconcileError::Dispatch(e)) => errors::dispatch_error_to_response(e),
    }
}
