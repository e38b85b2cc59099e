//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for reviewer signup, login, and logout.

use crate::error::{ApiError, ApiResult};
use crate::web::middleware::session_token;
use crate::web::protocol::{AuthResponse, LoginRequest, MessageResponse, SignupRequest};
use crate::web::state::AppState;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use review_core::domain::{Role, User};
use review_core::ports::PortError;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// Password and Cookie Helpers
//=========================================================================================

/// Hashes a password with a fresh salt.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })
}

fn verify_password(password: &str, hashed: &str) -> ApiResult<bool> {
    let parsed_hash = PasswordHash::new(hashed).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Opens a login session for `user` and builds the response carrying its cookie.
async fn start_auth_session(
    state: &AppState,
    user: &User,
    status: StatusCode,
) -> ApiResult<impl IntoResponse> {
    let auth_session_id = Uuid::new_v4().to_string();
    let lifetime = Duration::days(state.config.auth_session_days);

    state
        .users
        .create_auth_session(&auth_session_id, user.user_id, Utc::now() + lifetime)
        .await?;

    let cookie = format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        lifetime.num_seconds()
    );

    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(user)),
    ))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/signup - Create a new reviewer account
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PortError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        ))
        .into());
    }

    let password_hash = hash_password(&req.password)?;
    let user = state
        .users
        .create_user_with_email(&req.email, &password_hash, &req.display_name, Role::Reviewer)
        .await?;

    start_auth_session(&state, &user, StatusCode::CREATED).await
}

/// POST /api/auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_creds = state
        .users
        .get_user_by_email(&req.email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => PortError::Unauthorized,
            other => other,
        })?;

    if !verify_password(&req.password, &user_creds.hashed_password)? {
        return Err(PortError::Unauthorized.into());
    }

    let user = state.users.get_user(user_creds.user_id).await?;
    info!("User {} logged in", user.user_id);
    start_auth_session(&state, &user, StatusCode::OK).await
}

/// POST /api/auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let auth_session_id = session_token(&headers).ok_or(PortError::Unauthorized)?;
    state.users.delete_auth_session(auth_session_id).await?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie.to_string())],
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    ))
}
