//! Periodic expiry sweeper.
//!
//! The store never schedules its own cleanup; this loop is the external
//! caller that invokes [`SessionStore::cleanup_expired`] on an interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tenure_core::TenureResult;
use tenure_session::SessionStore;
use tracing::{debug, info, warn};

/// Runs one cleanup pass on a blocking thread, since it may do file I/O
/// while holding the store lock.
pub async fn sweep_once(store: &Arc<SessionStore>) -> anyhow::Result<usize> {
    let store = Arc::clone(store);
    let removed: TenureResult<usize> =
        tokio::task::spawn_blocking(move || store.cleanup_expired()).await?;
    Ok(removed?)
}

/// Calls [`sweep_once`] every `interval` until `shutdown` resolves.
///
/// A failed pass is logged and retried on the next tick. Returns the total
/// number of sessions removed.
pub async fn run<F>(store: Arc<SessionStore>, interval: Duration, shutdown: F) -> usize
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(interval_secs = interval.as_secs(), "Sweeper started");
    let mut total = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => match sweep_once(&store).await {
                Ok(removed) => {
                    total += removed;
                    debug!(removed, remaining = store.count(), "Sweep pass finished");
                }
                Err(e) => warn!(error = %e, "Sweep pass failed"),
            },
        }
    }
    info!(total_removed = total, "Sweeper stopped");
    total
}
