//! Periodic removal of empty sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::hub::RelayHub;

/// Spawn a task that sweeps empty sessions every `interval` until `cancel`
/// fires. The disconnect path already removes sessions as they empty; this
/// catches any that slipped through.
pub fn start_sweep_task(
    hub: Arc<RelayHub>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = hub.sweep();
                    if removed > 0 {
                        info!(removed, "swept empty sessions");
                    }
                }
                () = cancel.cancelled() => {
                    debug!("sweep task stopping");
                    break;
                }
            }
        }
    })
}
