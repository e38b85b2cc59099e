//! services/api/src/web/admin.rs
//!
//! Admin-only handlers: splitting an upload across reviewers, and the
//! progress and link-history views.

use crate::error::{ApiError, ApiResult};
use crate::web::protocol::{
    AssignmentPlanRequest, LimitQuery, ProgressResponse, RegistryResponse, UploadResponse,
    UserResponse,
};
use crate::web::rest::read_upload_form;
use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::Utc;
use review_core::domain::{CallerContext, Reviewer, ReviewerShare, Role};
use review_core::ports::PortError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_REGISTRY_LIMIT: usize = 50;

fn require_admin(caller: &CallerContext) -> ApiResult<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        warn!("User {} denied an admin route", caller.user_id);
        Err(PortError::Forbidden("admin role required".to_string()).into())
    }
}

/// List every reviewer account that can be handed work.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "Reviewer accounts", body = [UserResponse]),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    require_admin(&caller)?;
    let users = state.users.list_users().await?;
    Ok(Json(
        users
            .iter()
            .filter(|u| u.role == Role::Reviewer)
            .map(UserResponse::from)
            .collect(),
    ))
}

/// Upload a CSV and split its new links across reviewers.
///
/// The form carries a `csv_file` part and a `plan` part holding an
/// `AssignmentPlanRequest` as JSON. Reviewers who still hold a live admin
/// assignment block the whole request before the CSV is even parsed.
#[utoipa::path(
    post,
    path = "/api/admin/upload-assign",
    request_body(content_type = "multipart/form-data", description = "`csv_file` plus a `plan` JSON part."),
    responses(
        (status = 201, description = "Links classified, registered and assigned", body = UploadResponse),
        (status = 400, description = "Bad plan, bad ranges or unreadable CSV"),
        (status = 403, description = "Caller is not an admin"),
        (status = 409, description = "A targeted reviewer still has an active assignment")
    )
)]
pub async fn upload_assign_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    require_admin(&caller)?;
    let form = read_upload_form(multipart).await?;

    let raw_plan = form
        .plan
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Missing assignment plan".to_string()))?;
    let plan: AssignmentPlanRequest = serde_json::from_str(raw_plan)
        .map_err(|e| ApiError::BadRequest(format!("Invalid assignment plan: {}", e)))?;
    let shares = plan.to_shares()?;

    let targets: HashSet<Uuid> = shares.iter().map(ReviewerShare::user_id).collect();
    state
        .store
        .guard_admin_reassignment(&caller, &targets, Utc::now())
        .await?;

    let links = form.links()?;
    let directory: HashMap<Uuid, Reviewer> = state
        .users
        .list_users()
        .await?
        .iter()
        .map(|u| (u.user_id, u.as_reviewer()))
        .collect();

    let outcome = state
        .store
        .upload_and_assign(
            &caller,
            &links,
            &shares,
            plan.mode,
            &directory,
            &form.filename,
            Utc::now(),
        )
        .await?;

    info!(
        "Admin upload '{}' opened {} session(s), {} link(s) unassigned",
        form.filename,
        outcome.sessions.len(),
        outcome.unassigned
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse::from_outcome(
            &outcome,
            state.config.session_expiry_hours,
        )),
    ))
}

/// Review progress across every live session.
#[utoipa::path(
    get,
    path = "/api/admin/progress",
    responses(
        (status = 200, description = "Per-reviewer and overall counts", body = ProgressResponse),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
) -> ApiResult<Json<ProgressResponse>> {
    require_admin(&caller)?;
    let report = state.store.progress(&caller, Utc::now()).await?;
    Ok(Json(report.into()))
}

/// The size of the link history and its most recently seen entries.
#[utoipa::path(
    get,
    path = "/api/admin/registry",
    params(("limit" = Option<usize>, Query, description = "How many recent entries to return (default 50)")),
    responses(
        (status = 200, description = "Link history summary", body = RegistryResponse),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn registry_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<RegistryResponse>> {
    require_admin(&caller)?;
    let summary = state
        .store
        .registry_summary(&caller, query.limit.unwrap_or(DEFAULT_REGISTRY_LIMIT))
        .await?;
    Ok(Json(summary.into()))
}
