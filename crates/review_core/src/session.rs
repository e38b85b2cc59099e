//! crates/review_core/src/session.rs
//!
//! Per-reviewer session bookkeeping: the row status state machine, TTL
//! handling and the in-memory book of live sessions.

use crate::domain::{Assignment, ReviewSession, Row, RowStatus};
use crate::ports::{PortError, PortResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Maps the status spellings reviewers actually type onto a `RowStatus`.
pub fn normalize_status(raw: Option<&str>) -> PortResult<RowStatus> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(PortError::Validation("missing status".to_string()));
    }

    let lower = trimmed.to_lowercase();
    if matches!(lower.as_str(), "acept" | "acpt") || lower.starts_with("accept") {
        Ok(RowStatus::Accepted)
    } else if lower == "rej" || lower.starts_with("reject") {
        Ok(RowStatus::Rejected)
    } else {
        Err(PortError::Validation(format!("unknown status '{}'", trimmed)))
    }
}

/// Review counts for a set of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub pending: usize,
}

impl Tally {
    pub fn add(&mut self, other: Tally) {
        self.total += other.total;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.pending += other.pending;
    }
}

impl ReviewSession {
    /// Opens a session holding `assignment`'s rows.
    pub fn from_assignment(
        assignment: Assignment,
        assigned_by_admin: bool,
        source_filename: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: assignment.user_id,
            display_name: assignment.display_name,
            rows: assignment.rows,
            assigned_range: assignment.assigned_range,
            assigned_by_admin,
            source_filename: source_filename.to_string(),
            created_at: now,
            expires_at: now + ttl,
            last_accessed_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Sets the status of the first row whose link matches exactly.
    ///
    /// Feedback is kept only when the row ends up `Rejected`; any other
    /// target status clears it.
    pub fn update_row(
        &mut self,
        link: &str,
        status: Option<&str>,
        feedback: &str,
    ) -> PortResult<&Row> {
        let status = normalize_status(status)?;
        let link = link.trim();
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.link == link)
            .ok_or_else(|| PortError::NotFound(format!("Link {} not found in session", link)))?;

        row.status = status;
        row.feedback = match status {
            RowStatus::Rejected => feedback.to_string(),
            _ => String::new(),
        };
        Ok(row)
    }

    /// Rows whose verifier matches case-insensitively, or all rows.
    pub fn rows_for_verifier(&self, verifier: Option<&str>) -> Vec<Row> {
        match verifier.map(|v| v.trim().to_lowercase()).filter(|v| !v.is_empty()) {
            Some(wanted) => self
                .rows
                .iter()
                .filter(|r| r.verified_by.trim().to_lowercase() == wanted)
                .cloned()
                .collect(),
            None => self.rows.clone(),
        }
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally {
            total: self.rows.len(),
            ..Tally::default()
        };
        for row in &self.rows {
            match row.status {
                RowStatus::Accepted => tally.accepted += 1,
                RowStatus::Rejected => tally.rejected += 1,
                RowStatus::Pending => tally.pending += 1,
            }
        }
        tally
    }
}

/// All sessions currently held by the store, keyed by session id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionBook {
    sessions: HashMap<Uuid, ReviewSession>,
}

impl SessionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: ReviewSession) {
        self.sessions.insert(session.id, session);
    }

    pub fn get(&self, id: Uuid) -> Option<&ReviewSession> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut ReviewSession> {
        self.sessions.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReviewSession> {
        self.sessions.values()
    }

    /// A user's sessions, oldest first.
    pub fn for_user(&self, user_id: Uuid) -> Vec<&ReviewSession> {
        let mut owned: Vec<&ReviewSession> =
            self.sessions.values().filter(|s| s.user_id == user_id).collect();
        owned.sort_by_key(|s| (s.created_at, s.id));
        owned
    }

    /// Drops every expired session and returns how many went.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        before - self.sessions.len()
    }
}
