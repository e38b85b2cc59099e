//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the reviewer-facing REST endpoints and the
//! master definition for the OpenAPI specification.

use crate::adapters::csv_links::{extract_links, render_rows};
use crate::error::{ApiError, ApiResult};
use crate::web::protocol::*;
use crate::web::state::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::Utc;
use review_core::domain::CallerContext;
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        session_check_handler,
        upload_handler,
        list_sessions_handler,
        session_rows_handler,
        update_status_handler,
        download_handler,
        crate::web::admin::list_users_handler,
        crate::web::admin::upload_assign_handler,
        crate::web::admin::progress_handler,
        crate::web::admin::registry_handler,
    ),
    components(
        schemas(
            HealthResponse, SignupRequest, LoginRequest, AuthResponse, UserResponse,
            UpdateStatusRequest, ShareRequest, AssignmentPlanRequest, RangeResponse,
            TallyResponse, SessionSummary, RowResponse, RowsResponse, SessionCheckResponse,
            ProvenanceResponse, LinkEntryResponse, WithinFileDuplicateResponse,
            GlobalDuplicateResponse, SkippedShareResponse, UploadResponse,
            ReviewerProgressResponse, ProgressResponse, RegistryResponse, MessageResponse
        )
    ),
    tags(
        (name = "Link Review API", description = "Deduplicated link intake and review assignment.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Multipart Intake
//=========================================================================================

/// The parts of an upload form this API understands.
pub struct UploadForm {
    pub filename: String,
    pub csv: Option<Vec<u8>>,
    pub plan: Option<String>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Failed to read multipart data: {}", e))
}

/// Buffers the `csv_file` and `plan` parts of a form, ignoring anything else.
pub async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm {
        filename: String::new(),
        csv: None,
        plan: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "csv_file" => {
                form.filename = field.file_name().unwrap_or_default().trim().to_string();
                form.csv = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
            }
            "plan" => {
                form.plan = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }
    Ok(form)
}

impl UploadForm {
    /// Parses the CSV part into its raw link cells.
    pub fn links(&self) -> ApiResult<Vec<String>> {
        let bytes = self
            .csv
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;
        if self.filename.is_empty() {
            return Err(ApiError::BadRequest("Empty filename".to_string()));
        }
        Ok(extract_links(bytes)?)
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}

/// Reports whether the caller has any live review session.
#[utoipa::path(
    get,
    path = "/api/session-check",
    responses(
        (status = 200, description = "Session state for the caller", body = SessionCheckResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn session_check_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
) -> ApiResult<Json<SessionCheckResponse>> {
    let sessions = state.store.sessions_for(caller.user_id, Utc::now()).await?;
    Ok(Json(SessionCheckResponse {
        has_session: !sessions.is_empty(),
        expires_at: sessions.iter().map(|s| s.expires_at).max(),
        sessions: sessions.iter().map(SessionSummary::from).collect(),
    }))
}

/// Upload a CSV of links for the caller to review.
///
/// Every new link lands in one session owned by the caller; duplicates are
/// reported but never assigned.
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "A `csv_file` part with a link column."),
    responses(
        (status = 201, description = "Upload classified and registered", body = UploadResponse),
        (status = 400, description = "Missing or unreadable CSV"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = read_upload_form(multipart).await?;
    let links = form.links()?;

    let outcome = state
        .store
        .upload_for_reviewer(&caller, &links, &form.filename, Utc::now())
        .await?;

    info!(
        "Upload '{}' by {} opened {} session(s)",
        form.filename,
        caller.user_id,
        outcome.sessions.len()
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse::from_outcome(
            &outcome,
            state.config.session_expiry_hours,
        )),
    ))
}

/// List the caller's live review sessions.
#[utoipa::path(
    get,
    path = "/api/sessions",
    responses(
        (status = 200, description = "Live sessions, oldest first", body = [SessionSummary]),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
) -> ApiResult<Json<Vec<SessionSummary>>> {
    let sessions = state.store.sessions_for(caller.user_id, Utc::now()).await?;
    Ok(Json(sessions.iter().map(SessionSummary::from).collect()))
}

/// Fetch a session's rows, optionally only those for one verifier.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}/rows",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("verifier" = Option<String>, Query, description = "Only rows whose verifier matches, case-insensitively")
    ),
    responses(
        (status = 200, description = "Session rows", body = RowsResponse),
        (status = 403, description = "Session belongs to someone else"),
        (status = 404, description = "Session not found or expired")
    )
)]
pub async fn session_rows_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<VerifierQuery>,
) -> ApiResult<Json<RowsResponse>> {
    let session = state
        .store
        .open_session(&caller, session_id, Utc::now())
        .await?;
    let rows = session.rows_for_verifier(query.verifier.as_deref());

    Ok(Json(RowsResponse {
        session_id,
        total: rows.len(),
        data: rows.iter().map(RowResponse::from).collect(),
    }))
}

/// Mark one row of the caller's session as accepted or rejected.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/status",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Row updated", body = RowResponse),
        (status = 400, description = "Missing or unknown status"),
        (status = 403, description = "Session belongs to someone else"),
        (status = 404, description = "Session or link not found")
    )
)]
pub async fn update_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<RowResponse>> {
    let row = state
        .store
        .update_row(
            &caller,
            session_id,
            &req.link,
            req.status.as_deref(),
            &req.feedback,
            Utc::now(),
        )
        .await?;
    Ok(Json(RowResponse::from(&row)))
}

/// Download a session's rows as CSV.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}/download",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv"),
        (status = 403, description = "Session belongs to someone else"),
        (status = 404, description = "Session not found or expired")
    )
)]
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerContext>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let session = state
        .store
        .open_session(&caller, session_id, Utc::now())
        .await?;
    let body = render_rows(&session.rows)?;
    debug!("Exporting {} rows of session {}", session.rows.len(), session_id);

    let disposition = format!(
        "attachment; filename=\"reviewed_{}\"",
        session.source_filename.replace(['"', '\\', '/'], "_")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
