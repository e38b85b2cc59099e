//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use review_core::ports::UserService;
use review_core::store::ReviewStore;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ReviewStore>,
    pub users: Arc<dyn UserService>,
    pub config: Arc<Config>,
}
