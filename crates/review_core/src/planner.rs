//! crates/review_core/src/planner.rs
//!
//! Distributes a batch's new links across reviewers, either by percentage
//! split or by explicit 1-based inclusive row ranges.
//!
//! Percentage mode floors every share and leaves the rounding remainder
//! unassigned. Range mode allows ranges to overlap between reviewers.

use crate::domain::{AssignedRange, Assignment, PlanMode, ReviewerShare, Row};
use crate::ports::{PortError, PortResult, ReviewerDirectory};
use tracing::warn;
use uuid::Uuid;

/// Percentages may exceed 100 by this much before the request is rejected.
const PERCENT_TOLERANCE: f64 = 1e-9;

/// A share that was left out of the plan instead of failing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedShare {
    pub user_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignmentPlan {
    pub assignments: Vec<Assignment>,
    pub skipped: Vec<SkippedShare>,
    /// Rows covered by no assignment (percentage rounding or sparse ranges).
    pub unassigned: usize,
}

/// Computes one assignment per resolvable share.
///
/// Shares naming an unknown reviewer are skipped in both modes. Any other
/// invalid share fails the whole plan, so nothing is partially assigned.
pub fn plan<D: ReviewerDirectory + ?Sized>(
    new_links: &[String],
    shares: &[ReviewerShare],
    mode: PlanMode,
    directory: &D,
) -> PortResult<AssignmentPlan> {
    let (assignments, skipped) = match mode {
        PlanMode::Percentage => plan_by_percentage(new_links, shares, directory)?,
        PlanMode::Range => plan_by_range(new_links, shares, directory)?,
    };

    let mut covered = vec![false; new_links.len()];
    for range in assignments.iter().filter_map(|a| a.assigned_range) {
        for slot in &mut covered[range.start - 1..range.end] {
            *slot = true;
        }
    }
    let unassigned = covered.iter().filter(|c| !**c).count();

    Ok(AssignmentPlan {
        assignments,
        skipped,
        unassigned,
    })
}

type Planned = (Vec<Assignment>, Vec<SkippedShare>);

fn plan_by_percentage<D: ReviewerDirectory + ?Sized>(
    new_links: &[String],
    shares: &[ReviewerShare],
    directory: &D,
) -> PortResult<Planned> {
    let mut percentages = Vec::with_capacity(shares.len());
    for share in shares {
        match share {
            ReviewerShare::Percentage { percentage, .. } => {
                if !percentage.is_finite() || *percentage <= 0.0 {
                    return Err(PortError::Validation(format!(
                        "percentage must be greater than 0, got {}",
                        percentage
                    )));
                }
                percentages.push(*percentage);
            }
            ReviewerShare::Range { .. } => {
                return Err(PortError::Validation(
                    "range share supplied in percentage mode".to_string(),
                ))
            }
        }
    }
    let total_percent: f64 = percentages.iter().sum();
    if total_percent > 100.0 + PERCENT_TOLERANCE {
        return Err(PortError::Validation(format!(
            "percentages add up to {}, which exceeds 100",
            total_percent
        )));
    }

    let total = new_links.len();
    let mut cursor = 0usize;
    let mut assignments = Vec::new();
    let mut skipped = Vec::new();

    for (share, percentage) in shares.iter().zip(percentages) {
        let user_id = share.user_id();
        let Some(reviewer) = directory.reviewer(user_id) else {
            warn!("Skipping percentage share for unknown user {}", user_id);
            skipped.push(SkippedShare {
                user_id,
                reason: "user not found".to_string(),
            });
            continue;
        };

        let count = ((total as f64) * percentage / 100.0).floor() as usize;
        let end = (cursor + count).min(total);
        assignments.push(materialize(
            new_links,
            cursor,
            end,
            user_id,
            reviewer.display_name,
        ));
        cursor = end;
    }

    Ok((assignments, skipped))
}

fn plan_by_range<D: ReviewerDirectory + ?Sized>(
    new_links: &[String],
    shares: &[ReviewerShare],
    directory: &D,
) -> PortResult<Planned> {
    let total = new_links.len() as i64;
    let mut bounds = Vec::with_capacity(shares.len());

    // Validate everything first; one bad range aborts the batch.
    for share in shares {
        let ReviewerShare::Range {
            user_id,
            start_range,
            end_range,
        } = share
        else {
            return Err(PortError::Validation(
                "percentage share supplied in range mode".to_string(),
            ));
        };
        let (start, end) = (*start_range, *end_range);
        if start < 1 || end < 1 {
            return Err(PortError::Validation(format!(
                "range {}-{} for user {} must start at 1 or later",
                start, end, user_id
            )));
        }
        if start > total || end > total {
            return Err(PortError::Validation(format!(
                "range {}-{} for user {} exceeds the {} new rows",
                start, end, user_id, total
            )));
        }
        if start > end {
            return Err(PortError::Validation(format!(
                "range {}-{} for user {} starts after it ends",
                start, end, user_id
            )));
        }
        bounds.push((*user_id, start as usize, end as usize));
    }

    let mut assignments = Vec::new();
    let mut skipped = Vec::new();
    for (user_id, start, end) in bounds {
        let Some(reviewer) = directory.reviewer(user_id) else {
            warn!("Skipping range share for unknown user {}", user_id);
            skipped.push(SkippedShare {
                user_id,
                reason: "user not found".to_string(),
            });
            continue;
        };
        assignments.push(materialize(
            new_links,
            start - 1,
            end,
            user_id,
            reviewer.display_name,
        ));
    }

    Ok((assignments, skipped))
}

/// Builds the assignment for the 0-based half-open slice `[from, to)`.
fn materialize(
    new_links: &[String],
    from: usize,
    to: usize,
    user_id: Uuid,
    display_name: String,
) -> Assignment {
    let rows = new_links[from..to]
        .iter()
        .map(|link| Row::pending(link.clone(), display_name.clone()))
        .collect();
    let assigned_range = (to > from).then_some(AssignedRange {
        start: from + 1,
        end: to,
    });

    Assignment {
        user_id,
        display_name,
        rows,
        assigned_range,
    }
}
