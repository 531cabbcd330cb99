//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default timeout for graceful shutdown before giving up on tasks.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinates shutdown of the listener, the sweep task and open sockets.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, then wait up to `timeout` for `tasks` to finish.
    ///
    /// Tasks still running at the deadline are aborted. Returns `true` when
    /// every task finished on its own.
    pub async fn graceful_shutdown(
        &self,
        tasks: impl IntoIterator<Item = JoinHandle<()>>,
        timeout: Option<Duration>,
    ) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        let tasks: Vec<JoinHandle<()>> = tasks.into_iter().collect();
        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();

        self.shutdown();
        info!(
            task_count = tasks.len(),
            timeout_ms = timeout.as_millis() as u64,
            "draining relay tasks"
        );

        if tokio::time::timeout(timeout, futures::future::join_all(tasks))
            .await
            .is_ok()
        {
            return true;
        }
        let stuck = aborts.iter().filter(|a| !a.is_finished()).count();
        warn!(stuck, "shutdown timed out after {timeout:?}, aborting remaining tasks");
        for abort in aborts {
            abort.abort();
        }
        false
    }
}

/// Resolve on Ctrl+C, or SIGTERM on Unix.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                let _ = signal.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
    }

    #[test]
    fn shutdown_cancels_every_token() {
        let coord = ShutdownCoordinator::new();
        let t1 = coord.token();
        let t2 = coord.token();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
    }

    #[tokio::test]
    async fn graceful_shutdown_awaits_all_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let handle = tokio::spawn(async move {
            token.cancelled().await;
        });

        assert!(coord.graceful_shutdown([handle], None).await);
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn stuck_task_is_aborted() {
        let coord = ShutdownCoordinator::new();
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });
        let probe = handle.abort_handle();

        let clean = coord
            .graceful_shutdown([handle], Some(Duration::from_millis(100)))
            .await;
        assert!(!clean);
        for _ in 0..50 {
            if probe.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(probe.is_finished());
    }

    #[tokio::test]
    async fn no_tasks_is_clean() {
        let coord = ShutdownCoordinator::new();
        assert!(coord.graceful_shutdown(Vec::new(), None).await);
    }
}
