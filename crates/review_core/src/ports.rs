//! crates/review_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the review core.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or files.

use crate::domain::{Reviewer, Role, User, UserCredentials};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error type for every core operation and port.
///
/// None of these are transient: they are caused by caller input or by
/// caller-visible state, so nothing in the core retries them.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Reviewers still hold active admin assignments: {}", .0.join(", "))]
    Conflict(Vec<String>),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl From<serde_json::Error> for PortError {
    fn from(e: serde_json::Error) -> Self {
        PortError::Unexpected(format!("snapshot serialization failed: {}", e))
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable storage for store snapshots, keyed by an opaque identifier.
///
/// A mutation is only complete once `persist` has returned `Ok`.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn persist(&self, key: &str, snapshot: serde_json::Value) -> PortResult<()>;

    /// Returns the last persisted snapshot for `key`, if any.
    async fn load(&self, key: &str) -> PortResult<Option<serde_json::Value>>;
}

#[async_trait]
pub trait UserService: Send + Sync {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
        role: Role,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn list_users(&self) -> PortResult<Vec<User>>;

    // --- Auth Methods ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

/// Resolves reviewer ids named in an assignment request.
pub trait ReviewerDirectory {
    fn reviewer(&self, user_id: Uuid) -> Option<Reviewer>;
}

impl ReviewerDirectory for HashMap<Uuid, Reviewer> {
    fn reviewer(&self, user_id: Uuid) -> Option<Reviewer> {
        self.get(&user_id).cloned()
    }
}
