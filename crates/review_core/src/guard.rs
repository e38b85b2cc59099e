//! crates/review_core/src/guard.rs
//!
//! Refuses a new admin assignment batch while any targeted reviewer still
//! holds an unexpired admin-assigned session.

use crate::domain::ReviewSession;
use crate::ports::{PortError, PortResult};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

/// Fails with `PortError::Conflict` listing every conflicting display name.
///
/// Sessions the reviewer created by uploading for themselves never block.
pub fn check_no_active_assignment<'a, I>(
    target_user_ids: &HashSet<Uuid>,
    sessions: I,
    now: DateTime<Utc>,
) -> PortResult<()>
where
    I: IntoIterator<Item = &'a ReviewSession>,
{
    let conflicting: BTreeSet<&str> = sessions
        .into_iter()
        .filter(|s| s.assigned_by_admin && !s.is_expired(now))
        .filter(|s| target_user_ids.contains(&s.user_id))
        .map(|s| s.display_name.as_str())
        .collect();

    if conflicting.is_empty() {
        Ok(())
    } else {
        Err(PortError::Conflict(
            conflicting.into_iter().map(str::to_string).collect(),
        ))
    }
}
