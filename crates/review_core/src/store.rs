//! crates/review_core/src/store.rs
//!
//! The single shared mutable store behind every request handler.
//!
//! `ReviewStore` owns the link registry and the session book, each behind
//! its own lock. Every mutation runs under the commit gate: it works on a
//! copy of the state, hands the copy's snapshot to the `SnapshotSink`, and
//! only swaps the copy in once the sink has acknowledged it. A failed
//! persist therefore leaves the live state exactly as it was. Readers never
//! wait on the gate and only ever see acknowledged state. Locks are always
//! taken gate first, then registry, then sessions, and no I/O happens while
//! the registry or session lock is held.

use crate::dedup::classify;
use crate::domain::{
    CallerContext, DedupReport, LinkEntry, PlanMode, ReviewSession, Reviewer, ReviewerShare, Row,
};
use crate::guard::check_no_active_assignment;
use crate::planner::{plan, SkippedShare};
use crate::ports::{PortError, PortResult, ReviewerDirectory, SnapshotSink};
use crate::registry::LinkRegistry;
use crate::session::{SessionBook, Tally};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};
use uuid::Uuid;

pub const REGISTRY_KEY: &str = "link_registry";
pub const SESSIONS_KEY: &str = "review_sessions";

/// What an upload did: the classification plus the sessions it opened.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub report: DedupReport,
    /// Registry entries created by this upload.
    pub registered: usize,
    pub sessions: Vec<ReviewSession>,
    pub skipped: Vec<SkippedShare>,
    pub unassigned: usize,
}

#[derive(Debug, Clone)]
pub struct ReviewerProgress {
    pub user_id: Uuid,
    pub display_name: String,
    pub sessions: usize,
    pub tally: Tally,
}

#[derive(Debug, Clone)]
pub struct ProgressReport {
    pub live_sessions: usize,
    pub overall: Tally,
    pub reviewers: Vec<ReviewerProgress>,
}

#[derive(Debug, Clone)]
pub struct RegistrySummary {
    pub total_links: usize,
    pub recent: Vec<LinkEntry>,
}

pub struct ReviewStore {
    registry: RwLock<LinkRegistry>,
    sessions: Mutex<SessionBook>,
    sink: Arc<dyn SnapshotSink>,
    /// Held for the whole of every mutation, persist included.
    commit_gate: Mutex<()>,
    session_ttl: Duration,
}

impl ReviewStore {
    /// Restores the store from the sink's last snapshots, dropping any
    /// session that expired while the service was down.
    pub async fn open(
        sink: Arc<dyn SnapshotSink>,
        session_ttl: Duration,
        now: DateTime<Utc>,
    ) -> PortResult<Self> {
        let registry: LinkRegistry = match sink.load(REGISTRY_KEY).await? {
            Some(value) => serde_json::from_value(value)?,
            None => LinkRegistry::new(),
        };
        let mut sessions: SessionBook = match sink.load(SESSIONS_KEY).await? {
            Some(value) => serde_json::from_value(value)?,
            None => SessionBook::new(),
        };
        let evicted = sessions.evict_expired(now);
        info!(
            "Review store opened with {} links and {} sessions ({} expired dropped)",
            registry.len(),
            sessions.len(),
            evicted
        );

        Ok(Self {
            registry: RwLock::new(registry),
            sessions: Mutex::new(sessions),
            sink,
            commit_gate: Mutex::new(()),
            session_ttl,
        })
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    //=====================================================================================
    // Link History
    //=====================================================================================

    /// Classifies `batch` against a read view of the registry.
    pub async fn classify<S: AsRef<str> + Sync>(&self, batch: &[S]) -> DedupReport {
        let registry = self.registry.read().await;
        classify(batch, &registry)
    }

    /// Records `links` as uploaded by `actor` and returns how many were new.
    pub async fn register<S: AsRef<str> + Sync>(
        &self,
        links: &[S],
        actor: &str,
        now: DateTime<Utc>,
    ) -> PortResult<usize> {
        let _commit = self.commit_gate.lock().await;
        let mut registry = self.registry.read().await.clone();
        let created = registry.register(links, actor, now);
        self.commit_registry(registry).await?;
        Ok(created)
    }

    pub async fn registry_summary(
        &self,
        caller: &CallerContext,
        limit: usize,
    ) -> PortResult<RegistrySummary> {
        require_admin(caller)?;
        let registry = self.registry.read().await;
        Ok(RegistrySummary {
            total_links: registry.len(),
            recent: registry.recent(limit),
        })
    }

    //=====================================================================================
    // Uploads
    //=====================================================================================

    /// A reviewer uploading for themselves: every new link goes into one
    /// session they own.
    pub async fn upload_for_reviewer<S: AsRef<str> + Sync>(
        &self,
        caller: &CallerContext,
        batch: &[S],
        source_filename: &str,
        now: DateTime<Utc>,
    ) -> PortResult<UploadOutcome> {
        let _commit = self.commit_gate.lock().await;
        let (mut registry, mut book) = self.working_copy().await;
        book.evict_expired(now);

        let report = classify(batch, &registry);
        let mut sessions = Vec::new();
        if !report.new_links.is_empty() {
            let share = ReviewerShare::Range {
                user_id: caller.user_id,
                start_range: 1,
                end_range: report.new_links.len() as i64,
            };
            let directory = HashMap::from([(
                caller.user_id,
                Reviewer {
                    user_id: caller.user_id,
                    display_name: caller.display_name.clone(),
                },
            )]);
            let planned = plan(&report.new_links, &[share], PlanMode::Range, &directory)?;
            for assignment in planned.assignments {
                sessions.push(ReviewSession::from_assignment(
                    assignment,
                    false,
                    source_filename,
                    now,
                    self.session_ttl,
                ));
            }
        }

        let registered = record_upload(&mut registry, &report, &caller.display_name, now);
        for session in &sessions {
            book.insert(session.clone());
        }
        self.commit_both(registry, book).await?;

        info!(
            "User {} uploaded {} links: {} new, {} duplicates, {} empty",
            caller.user_id,
            report.batch_length,
            report.new_links.len(),
            report.total_duplicates_removed(),
            report.empty_links_removed
        );
        Ok(UploadOutcome {
            report,
            registered,
            sessions,
            skipped: Vec::new(),
            unassigned: 0,
        })
    }

    /// Fails if any targeted reviewer still holds a live admin session.
    ///
    /// Runs before the upload is even parsed so a rejected request has no
    /// side effects. `upload_and_assign` repeats the check under the gate.
    pub async fn guard_admin_reassignment(
        &self,
        caller: &CallerContext,
        target_user_ids: &HashSet<Uuid>,
        now: DateTime<Utc>,
    ) -> PortResult<()> {
        require_admin(caller)?;
        let book = self.sessions.lock().await;
        check_no_active_assignment(target_user_ids, book.iter(), now)
    }

    /// Classifies the batch, plans the split and opens one admin session per
    /// non-empty assignment.
    ///
    /// Nothing is registered or opened unless the guard, the plan and the
    /// persist all succeed.
    #[allow(clippy::too_many_arguments)]
    pub async fn upload_and_assign<S, D>(
        &self,
        caller: &CallerContext,
        batch: &[S],
        shares: &[ReviewerShare],
        mode: PlanMode,
        directory: &D,
        source_filename: &str,
        now: DateTime<Utc>,
    ) -> PortResult<UploadOutcome>
    where
        S: AsRef<str> + Sync,
        D: ReviewerDirectory + Sync + ?Sized,
    {
        require_admin(caller)?;
        if shares.is_empty() {
            return Err(PortError::Validation(
                "at least one share is required".to_string(),
            ));
        }

        let _commit = self.commit_gate.lock().await;
        let (mut registry, mut book) = self.working_copy().await;
        book.evict_expired(now);

        let targets: HashSet<Uuid> = shares.iter().map(ReviewerShare::user_id).collect();
        check_no_active_assignment(&targets, book.iter(), now)?;

        let report = classify(batch, &registry);
        let planned = plan(&report.new_links, shares, mode, directory)?;

        let registered = record_upload(&mut registry, &report, &caller.display_name, now);
        let sessions: Vec<ReviewSession> = planned
            .assignments
            .into_iter()
            .filter(|a| !a.rows.is_empty())
            .map(|a| {
                ReviewSession::from_assignment(a, true, source_filename, now, self.session_ttl)
            })
            .collect();
        for session in &sessions {
            book.insert(session.clone());
        }
        self.commit_both(registry, book).await?;

        info!(
            "Admin {} assigned {} of {} new links across {} sessions ({} skipped shares)",
            caller.user_id,
            report.new_links.len() - planned.unassigned,
            report.new_links.len(),
            sessions.len(),
            planned.skipped.len()
        );
        Ok(UploadOutcome {
            report,
            registered,
            sessions,
            skipped: planned.skipped,
            unassigned: planned.unassigned,
        })
    }

    //=====================================================================================
    // Sessions
    //=====================================================================================

    /// The caller's live sessions, oldest first.
    pub async fn sessions_for(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<ReviewSession>> {
        let book = self.sessions.lock().await;
        Ok(book
            .for_user(user_id)
            .into_iter()
            .filter(|s| !s.is_expired(now))
            .cloned()
            .collect())
    }

    /// Fetches a session for its owner (or an admin) and marks it accessed.
    pub async fn open_session(
        &self,
        caller: &CallerContext,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<ReviewSession> {
        let _commit = self.commit_gate.lock().await;
        let mut book = self.sessions.lock().await.clone();
        book.evict_expired(now);
        let session = book
            .get_mut(session_id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
        if session.user_id != caller.user_id && !caller.is_admin() {
            return Err(PortError::Forbidden(
                "session belongs to another reviewer".to_string(),
            ));
        }
        session.last_accessed_at = now;
        let opened = session.clone();

        self.commit_sessions(book).await?;
        Ok(opened)
    }

    /// Applies one status change to a row of the caller's own session.
    pub async fn update_row(
        &self,
        caller: &CallerContext,
        session_id: Uuid,
        link: &str,
        status: Option<&str>,
        feedback: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Row> {
        let _commit = self.commit_gate.lock().await;
        let mut book = self.sessions.lock().await.clone();
        book.evict_expired(now);
        let session = book
            .get_mut(session_id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
        if session.user_id != caller.user_id {
            return Err(PortError::Forbidden(
                "only the assigned reviewer can update this session".to_string(),
            ));
        }
        let row = session.update_row(link, status, feedback)?.clone();
        session.last_accessed_at = now;

        self.commit_sessions(book).await?;
        debug!(
            "Session {} row {} marked {:?}",
            session_id, row.link, row.status
        );
        Ok(row)
    }

    /// Aggregate review progress over every live session.
    pub async fn progress(
        &self,
        caller: &CallerContext,
        now: DateTime<Utc>,
    ) -> PortResult<ProgressReport> {
        require_admin(caller)?;
        let book = self.sessions.lock().await;

        let mut by_user: BTreeMap<(String, Uuid), ReviewerProgress> = BTreeMap::new();
        let mut overall = Tally::default();
        let mut live_sessions = 0;
        for session in book.iter().filter(|s| !s.is_expired(now)) {
            let tally = session.tally();
            overall.add(tally);
            live_sessions += 1;
            let entry = by_user
                .entry((session.display_name.clone(), session.user_id))
                .or_insert_with(|| ReviewerProgress {
                    user_id: session.user_id,
                    display_name: session.display_name.clone(),
                    sessions: 0,
                    tally: Tally::default(),
                });
            entry.sessions += 1;
            entry.tally.add(tally);
        }

        Ok(ProgressReport {
            live_sessions,
            overall,
            reviewers: by_user.into_values().collect(),
        })
    }

    /// Drops expired sessions; used by the background sweeper.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> PortResult<usize> {
        let _commit = self.commit_gate.lock().await;
        let mut book = self.sessions.lock().await.clone();
        let evicted = book.evict_expired(now);
        if evicted > 0 {
            self.commit_sessions(book).await?;
            info!("Swept {} expired review sessions", evicted);
        }
        Ok(evicted)
    }

    //=====================================================================================
    // Persistence
    //=====================================================================================
    //
    // Callers hold the commit gate, so the live state cannot move between
    // the copy being cut and the copy being swapped in.

    async fn working_copy(&self) -> (LinkRegistry, SessionBook) {
        let registry = self.registry.read().await.clone();
        let book = self.sessions.lock().await.clone();
        (registry, book)
    }

    async fn commit_registry(&self, registry: LinkRegistry) -> PortResult<()> {
        let snapshot = serde_json::to_value(&registry)?;
        self.sink.persist(REGISTRY_KEY, snapshot).await?;
        *self.registry.write().await = registry;
        Ok(())
    }

    async fn commit_sessions(&self, book: SessionBook) -> PortResult<()> {
        let snapshot = serde_json::to_value(&book)?;
        self.sink.persist(SESSIONS_KEY, snapshot).await?;
        *self.sessions.lock().await = book;
        Ok(())
    }

    /// Persists both snapshots, then swaps both in.
    ///
    /// If the session snapshot fails after the registry one was written, the
    /// previous registry snapshot is written back so storage matches memory.
    async fn commit_both(&self, registry: LinkRegistry, book: SessionBook) -> PortResult<()> {
        let registry_snapshot = serde_json::to_value(&registry)?;
        let sessions_snapshot = serde_json::to_value(&book)?;

        self.sink.persist(REGISTRY_KEY, registry_snapshot).await?;
        if let Err(e) = self.sink.persist(SESSIONS_KEY, sessions_snapshot).await {
            let previous = serde_json::to_value(&*self.registry.read().await)?;
            if let Err(revert) = self.sink.persist(REGISTRY_KEY, previous).await {
                error!("Failed to restore the registry snapshot: {}", revert);
            }
            return Err(e);
        }

        let mut live_registry = self.registry.write().await;
        let mut live_book = self.sessions.lock().await;
        *live_registry = registry;
        *live_book = book;
        Ok(())
    }
}

/// Registers the batch's new links and records a sighting of every global
/// duplicate. Returns the number of entries created.
fn record_upload(
    registry: &mut LinkRegistry,
    report: &DedupReport,
    actor: &str,
    now: DateTime<Utc>,
) -> usize {
    let created = registry.register(&report.new_links, actor, now);
    let seen_again: Vec<&str> = report
        .global_duplicates
        .iter()
        .map(|g| g.link.as_str())
        .collect();
    registry.register(&seen_again, actor, now);
    created
}

fn require_admin(caller: &CallerContext) -> PortResult<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(PortError::Forbidden("admin role required".to_string()))
    }
}
