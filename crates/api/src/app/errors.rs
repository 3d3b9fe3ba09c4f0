use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use storefront_infra::command_dispatcher::DispatchError;

use crate::app::services::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Dispatch(e) => dispatch_error_to_response(e),
        ServiceError::Provider(e) => {
            tracing::error!(error = %e, "payment provider call failed");
            json_error(
                StatusCode::BAD_GATEWAY,
                "provider_error",
                "payment provider unavailable",
            )
        }
    }
}

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::InsufficientStock(msg) => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", msg)
        }
        DispatchError::ProductNotFound(msg) => {
            json_error(StatusCode::NOT_FOUND, "product_not_found", msg)
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            tracing::error!(error = %msg, "event deserialization failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
        DispatchError::Store(e) => {
            tracing::error!(error = ?e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
        DispatchError::StreamMismatch(msg) => {
            tracing::error!(error = %msg, "stream mismatch");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
        DispatchError::Publish(msg) => {
            tracing::error!(error = %msg, "event publication failed");
            json_error(StatusCode::BAD_GATEWAY, "publish_error", "event publication failed")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
