//! crates/review_core/src/lib.rs
//!
//! Link deduplication and work assignment for the CSV review workflow.

pub mod dedup;
pub mod domain;
pub mod guard;
pub mod planner;
pub mod ports;
pub mod registry;
pub mod session;
pub mod store;

pub use domain::{
    AssignedRange, Assignment, AuthSession, CallerContext, DedupReport, GlobalDuplicate,
    LinkEntry, PlanMode, ReviewSession, Reviewer, ReviewerShare, Role, Row, RowStatus, User,
    UserCredentials, WithinFileDuplicate,
};
pub use ports::{PortError, PortResult, ReviewerDirectory, SnapshotSink, UserService};
pub use store::{ProgressReport, RegistrySummary, ReviewStore, ReviewerProgress, UploadOutcome};
