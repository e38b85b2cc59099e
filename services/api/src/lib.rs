//! services/api/src/lib.rs
//!
//! The HTTP service around `review_core`: axum routes, auth, CSV intake and
//! the snapshot sinks.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
