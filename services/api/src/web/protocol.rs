//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API
//! server. Core types are mapped into these at the boundary so the core crate
//! stays free of HTTP and OpenAPI concerns.

use chrono::{DateTime, Utc};
use review_core::domain::{
    AssignedRange, GlobalDuplicate, LinkEntry, PlanMode, ReviewSession, ReviewerShare, Role, Row,
    User, WithinFileDuplicate,
};
use review_core::planner::SkippedShare;
use review_core::ports::{PortError, PortResult};
use review_core::session::Tally;
use review_core::store::{ProgressReport, RegistrySummary, UploadOutcome};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Requests Sent FROM the Client
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Marks one row of a session. `status` accepts the usual spellings
/// ("accept", "Rejected", "rej", ...).
#[derive(Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub link: String,
    pub status: Option<String>,
    #[serde(default)]
    pub feedback: String,
}

/// One reviewer's share of an admin upload. Percentage mode reads
/// `percentage`; range mode reads `start_range` and `end_range` (1-based, inclusive).
#[derive(Deserialize, ToSchema)]
pub struct ShareRequest {
    pub user_id: Uuid,
    pub percentage: Option<f64>,
    pub start_range: Option<i64>,
    pub end_range: Option<i64>,
}

/// The `plan` part of an admin upload-and-assign request.
#[derive(Deserialize, ToSchema)]
pub struct AssignmentPlanRequest {
    #[schema(value_type = String, example = "percentage")]
    pub mode: PlanMode,
    pub shares: Vec<ShareRequest>,
}

impl AssignmentPlanRequest {
    /// Turns the loose request shape into the shares the planner expects.
    pub fn to_shares(&self) -> PortResult<Vec<ReviewerShare>> {
        self.shares
            .iter()
            .map(|share| match (self.mode, share) {
                (
                    PlanMode::Percentage,
                    ShareRequest {
                        percentage: Some(percentage),
                        ..
                    },
                ) => Ok(ReviewerShare::Percentage {
                    user_id: share.user_id,
                    percentage: *percentage,
                }),
                (
                    PlanMode::Range,
                    ShareRequest {
                        start_range: Some(start_range),
                        end_range: Some(end_range),
                        ..
                    },
                ) => Ok(ReviewerShare::Range {
                    user_id: share.user_id,
                    start_range: *start_range,
                    end_range: *end_range,
                }),
                (PlanMode::Percentage, _) => Err(PortError::Validation(format!(
                    "share for user {} is missing percentage",
                    share.user_id
                ))),
                (PlanMode::Range, _) => Err(PortError::Validation(format!(
                    "share for user {} needs start_range and end_range",
                    share.user_id
                ))),
            })
            .collect()
    }
}

#[derive(Deserialize, Debug)]
pub struct VerifierQuery {
    pub verifier: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

//=========================================================================================
// Responses Sent FROM the Server
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: String,
}

fn role_name(role: Role) -> String {
    match role {
        Role::Admin => "admin",
        Role::Reviewer => "reviewer",
    }
    .to_string()
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: role_name(user.role),
        }
    }
}

impl From<&User> for AuthResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: role_name(user.role),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RangeResponse {
    pub start: usize,
    pub end: usize,
}

impl From<AssignedRange> for RangeResponse {
    fn from(range: AssignedRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

#[derive(Serialize, ToSchema, Default, Clone, Copy)]
pub struct TallyResponse {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub pending: usize,
}

impl From<Tally> for TallyResponse {
    fn from(t: Tally) -> Self {
        Self {
            total: t.total,
            accepted: t.accepted,
            rejected: t.rejected,
            pending: t.pending,
        }
    }
}

/// A session without its rows.
#[derive(Serialize, ToSchema)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub assigned_by_admin: bool,
    pub source_filename: String,
    pub assigned_range: Option<RangeResponse>,
    pub progress: TallyResponse,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&ReviewSession> for SessionSummary {
    fn from(s: &ReviewSession) -> Self {
        Self {
            session_id: s.id,
            user_id: s.user_id,
            display_name: s.display_name.clone(),
            assigned_by_admin: s.assigned_by_admin,
            source_filename: s.source_filename.clone(),
            assigned_range: s.assigned_range.map(RangeResponse::from),
            progress: s.tally().into(),
            created_at: s.created_at,
            expires_at: s.expires_at,
        }
    }
}

/// A row as the review table shows it; keys match the spreadsheet columns.
#[derive(Serialize, ToSchema)]
pub struct RowResponse {
    pub link: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Feedback")]
    pub feedback: String,
    #[serde(rename = "Verified By")]
    pub verified_by: String,
}

impl From<&Row> for RowResponse {
    fn from(row: &Row) -> Self {
        Self {
            link: row.link.clone(),
            status: row.status.as_str().to_string(),
            feedback: row.feedback.clone(),
            verified_by: row.verified_by.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RowsResponse {
    pub session_id: Uuid,
    pub data: Vec<RowResponse>,
    pub total: usize,
}

#[derive(Serialize, ToSchema)]
pub struct SessionCheckResponse {
    #[serde(rename = "hasSession")]
    pub has_session: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct ProvenanceResponse {
    pub first_uploaded_by: String,
    pub first_uploaded_at: DateTime<Utc>,
    pub last_uploaded_by: String,
    pub last_uploaded_at: DateTime<Utc>,
    pub upload_count: u64,
}

#[derive(Serialize, ToSchema)]
pub struct LinkEntryResponse {
    pub link: String,
    #[serde(flatten)]
    pub provenance: ProvenanceResponse,
}

impl From<&LinkEntry> for ProvenanceResponse {
    fn from(e: &LinkEntry) -> Self {
        Self {
            first_uploaded_by: e.first_uploaded_by.clone(),
            first_uploaded_at: e.first_uploaded_at,
            last_uploaded_by: e.last_uploaded_by.clone(),
            last_uploaded_at: e.last_uploaded_at,
            upload_count: e.upload_count,
        }
    }
}

impl From<&LinkEntry> for LinkEntryResponse {
    fn from(e: &LinkEntry) -> Self {
        Self {
            link: e.link.clone(),
            provenance: e.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct WithinFileDuplicateResponse {
    pub link: String,
    pub first_index: usize,
}

impl From<&WithinFileDuplicate> for WithinFileDuplicateResponse {
    fn from(d: &WithinFileDuplicate) -> Self {
        Self {
            link: d.link.clone(),
            first_index: d.first_index,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct GlobalDuplicateResponse {
    pub link: String,
    pub provenance: ProvenanceResponse,
}

impl From<&GlobalDuplicate> for GlobalDuplicateResponse {
    fn from(d: &GlobalDuplicate) -> Self {
        Self {
            link: d.link.clone(),
            provenance: (&d.provenance).into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SkippedShareResponse {
    pub user_id: Uuid,
    pub reason: String,
}

impl From<&SkippedShare> for SkippedShareResponse {
    fn from(s: &SkippedShare) -> Self {
        Self {
            user_id: s.user_id,
            reason: s.reason.clone(),
        }
    }
}

/// The deduplication report and the sessions an upload opened.
#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub total_rows: usize,
    pub empty_links_removed: usize,
    pub duplicates_removed: usize,
    pub global_duplicates_removed: usize,
    pub total_duplicates_removed: usize,
    pub new_links: usize,
    pub registered: usize,
    pub unassigned: usize,
    pub expires_in_hours: i64,
    pub within_file_duplicates: Vec<WithinFileDuplicateResponse>,
    pub global_duplicates: Vec<GlobalDuplicateResponse>,
    pub sessions: Vec<SessionSummary>,
    pub skipped: Vec<SkippedShareResponse>,
}

impl UploadResponse {
    pub fn from_outcome(outcome: &UploadOutcome, expires_in_hours: i64) -> Self {
        let report = &outcome.report;
        Self {
            message: "CSV uploaded successfully".to_string(),
            total_rows: report.batch_length,
            empty_links_removed: report.empty_links_removed,
            duplicates_removed: report.within_file_duplicates.len(),
            global_duplicates_removed: report.global_duplicates.len(),
            total_duplicates_removed: report.total_duplicates_removed(),
            new_links: report.new_links.len(),
            registered: outcome.registered,
            unassigned: outcome.unassigned,
            expires_in_hours,
            within_file_duplicates: report.within_file_duplicates.iter().map(Into::into).collect(),
            global_duplicates: report.global_duplicates.iter().map(Into::into).collect(),
            sessions: outcome.sessions.iter().map(Into::into).collect(),
            skipped: outcome.skipped.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ReviewerProgressResponse {
    pub user_id: Uuid,
    pub display_name: String,
    pub sessions: usize,
    pub progress: TallyResponse,
}

#[derive(Serialize, ToSchema)]
pub struct ProgressResponse {
    pub live_sessions: usize,
    pub overall: TallyResponse,
    pub reviewers: Vec<ReviewerProgressResponse>,
}

impl From<ProgressReport> for ProgressResponse {
    fn from(report: ProgressReport) -> Self {
        Self {
            live_sessions: report.live_sessions,
            overall: report.overall.into(),
            reviewers: report
                .reviewers
                .into_iter()
                .map(|r| ReviewerProgressResponse {
                    user_id: r.user_id,
                    display_name: r.display_name,
                    sessions: r.sessions,
                    progress: r.tally.into(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RegistryResponse {
    pub total_links: usize,
    pub recent: Vec<LinkEntryResponse>,
}

impl From<RegistrySummary> for RegistryResponse {
    fn from(summary: RegistrySummary) -> Self {
        Self {
            total_links: summary.total_links,
            recent: summary.recent.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
