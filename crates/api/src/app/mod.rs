//! HTTP application wiring.
//!
//! All state is shared through a single [`services::AppServices`] extension.
//! User-scoped routes sit behind the user-context middleware; the payment
//! webhook and health check do not, since the provider authenticates with a
//! signature instead of a user header.

use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use crate::config::Config;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub fn build_app(config: Config) -> Router {
    let services = Arc::new(services::build_services(config));

    let protected = routes::router()
        .layer(axum::middleware::from_fn(middleware::user_context_middleware));

    Router::new()
        .route("/health", get(health))
        .nest("/webhooks", routes::webhooks::router())
        .merge(protected)
        .layer(Extension(services))
}

async fn health() -> &'static str {
    "ok"
}
