pub mod admin;
pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod sweeper;

pub use middleware::require_auth;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::web::{
    admin::{list_users_handler, progress_handler, registry_handler, upload_assign_handler},
    auth::{login_handler, logout_handler, signup_handler},
    rest::{
        download_handler, health_handler, list_sessions_handler, session_check_handler,
        session_rows_handler, update_status_handler, upload_handler, ApiDoc,
    },
    state::AppState,
};

/// Largest accepted request body (CSV uploads included).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Builds the full application router: public routes, cookie-protected
/// routes and the Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/auth/signup", post(signup_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/session-check", get(session_check_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/sessions", get(list_sessions_handler))
        .route("/api/sessions/{id}/rows", get(session_rows_handler))
        .route("/api/sessions/{id}/status", post(update_status_handler))
        .route("/api/sessions/{id}/download", get(download_handler))
        .route("/api/admin/users", get(list_users_handler))
        .route("/api/admin/upload-assign", post(upload_assign_handler))
        .route("/api/admin/progress", get(progress_handler))
        .route("/api/admin/registry", get(registry_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
