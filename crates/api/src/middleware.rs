use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use storefront_core::UserId;

use crate::context::UserContext;

/// Attach the caller's [`UserContext`] from the `x-user-id` header.
///
/// Identity verification is handled upstream (gateway); this service only
/// requires the id to be present and well-formed.
pub async fn user_context_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let user_id = extract_user_id(req.headers())?;

    req.extensions_mut().insert(UserContext::new(user_id));

    Ok(next.run(req).await)
}

fn extract_user_id(headers: &HeaderMap) -> Result<UserId, StatusCode> {
    let header = headers
        .get("x-user-id")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    header
        .trim()
        .parse::<UserId>()
        .map_err(|_| StatusCode::UNAUTHORIZED)
}
