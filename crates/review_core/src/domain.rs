//! crates/review_core/src/domain.rs
//!
//! Defines the pure, core data structures for the review workflow.
//! These structs are independent of any database, HTTP layer or file format;
//! serde derives exist only so stores can be snapshotted by a persistence sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Link History
//=========================================================================================

/// One entry per distinct link ever accepted into the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub link: String,
    pub first_uploaded_by: String,
    pub first_uploaded_at: DateTime<Utc>,
    pub last_uploaded_by: String,
    pub last_uploaded_at: DateTime<Utc>,
    pub upload_count: u64,
}

/// A 2nd+ occurrence of a link inside the same batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithinFileDuplicate {
    pub link: String,
    /// Index (0-based, in the raw batch) of the link's first occurrence.
    pub first_index: usize,
}

/// A link whose first batch occurrence was already in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalDuplicate {
    pub link: String,
    /// Registry entry as it was at lookup time.
    pub provenance: LinkEntry,
}

/// The result of one classification pass over one uploaded batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    /// Raw number of entries in the batch, empty ones included.
    pub batch_length: usize,
    pub empty_links_removed: usize,
    pub within_file_duplicates: Vec<WithinFileDuplicate>,
    pub global_duplicates: Vec<GlobalDuplicate>,
    pub new_links: Vec<String>,
}

impl DedupReport {
    /// Number of distinct non-empty links seen in the batch.
    pub fn distinct_links(&self) -> usize {
        self.global_duplicates.len() + self.new_links.len()
    }

    /// Everything that did not survive as a new link, empty entries excluded.
    pub fn total_duplicates_removed(&self) -> usize {
        self.batch_length - self.empty_links_removed - self.new_links.len()
    }
}

//=========================================================================================
// Work Assignment
//=========================================================================================

/// How an admin batch is split across reviewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    Percentage,
    Range,
}

/// One reviewer's requested share of a batch.
///
/// Ranges are 1-based and inclusive. They are signed so that out-of-bounds
/// input can be reported instead of failing to parse.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewerShare {
    Range {
        user_id: Uuid,
        start_range: i64,
        end_range: i64,
    },
    Percentage {
        user_id: Uuid,
        percentage: f64,
    },
}

impl ReviewerShare {
    pub fn user_id(&self) -> Uuid {
        match self {
            ReviewerShare::Range { user_id, .. } | ReviewerShare::Percentage { user_id, .. } => {
                *user_id
            }
        }
    }
}

/// A user who can be handed rows, as resolved from the user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    pub user_id: Uuid,
    pub display_name: String,
}

/// 1-based inclusive row range inside a batch's new links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedRange {
    pub start: usize,
    pub end: usize,
}

/// The contiguous slice of new links handed to one reviewer for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub user_id: Uuid,
    pub display_name: String,
    pub rows: Vec<Row>,
    /// `None` when the reviewer's share rounded down to zero rows.
    pub assigned_range: Option<AssignedRange>,
}

//=========================================================================================
// Review State
//=========================================================================================

/// Review status of a single row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    #[default]
    #[serde(rename = "")]
    Pending,
    Accepted,
    Rejected,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Pending => "",
            RowStatus::Accepted => "Accepted",
            RowStatus::Rejected => "Rejected",
        }
    }
}

/// One link under review. Field names match the spreadsheet columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub link: String,
    #[serde(rename = "Status")]
    pub status: RowStatus,
    #[serde(rename = "Feedback")]
    pub feedback: String,
    #[serde(rename = "Verified By")]
    pub verified_by: String,
}

impl Row {
    pub fn pending(link: impl Into<String>, verified_by: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            status: RowStatus::Pending,
            feedback: String::new(),
            verified_by: verified_by.into(),
        }
    }
}

/// A reviewer's live working set of rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub rows: Vec<Row>,
    pub assigned_range: Option<AssignedRange>,
    pub assigned_by_admin: bool,
    pub source_filename: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

//=========================================================================================
// Users
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Reviewer,
}

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

impl User {
    pub fn as_reviewer(&self) -> Reviewer {
        Reviewer {
            user_id: self.user_id,
            display_name: self.display_name.clone(),
        }
    }
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// The validated identity of whoever is calling into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: Uuid,
    pub display_name: String,
    pub role: Role,
}

impl CallerContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for CallerContext {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            display_name: user.display_name.clone(),
            role: user.role,
        }
    }
}
