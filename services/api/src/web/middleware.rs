//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use review_core::domain::CallerContext;
use review_core::ports::PortError;
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Header accepted in place of the cookie by non-browser clients.
pub const SESSION_HEADER: &str = "x-session-token";

/// Pulls the login session id from the `session` cookie, or failing that,
/// from the `X-Session-Token` header.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    })
}

/// Middleware that validates the login session and resolves the caller.
///
/// If valid, inserts a `CallerContext` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_session_id = session_token(req.headers()).ok_or(PortError::Unauthorized)?;

    let user_id = state.users.validate_auth_session(auth_session_id).await?;

    // The account can disappear from under a live cookie after a restore.
    let user = state.users.get_user(user_id).await.map_err(|e| {
        warn!("Auth session points at unknown user {}: {}", user_id, e);
        PortError::Unauthorized
    })?;

    req.extensions_mut().insert(CallerContext::from(&user));
    Ok(next.run(req).await)
}
