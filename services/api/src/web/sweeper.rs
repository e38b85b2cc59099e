//! services/api/src/web/sweeper.rs
//!
//! The background task that evicts expired review sessions even when no
//! request touches the store.

use chrono::Utc;
use review_core::ports::PortResult;
use review_core::store::ReviewStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Sweeps expired sessions every `interval` until `cancellation_token` fires.
///
/// A failed sweep is logged and retried on the next tick; the sessions stay
/// evicted in memory either way.
pub async fn sweep_process(
    store: Arc<ReviewStore>,
    interval: Duration,
    cancellation_token: CancellationToken,
) -> PortResult<()> {
    info!("Session sweeper started ({}s interval).", interval.as_secs());
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Session sweeper cancelled.");
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(e) = store.sweep_expired(Utc::now()).await {
                    error!("Session sweep failed: {}", e);
                }
            }
        }
    }
}
