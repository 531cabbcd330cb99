//! HTTP listener and WebSocket upgrade endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::hub::{RelayHub, SessionLimits};
use crate::shutdown::ShutdownCoordinator;
use crate::socket::run_socket;
use crate::sweeper::start_sweep_task;

/// Shared state handed to every request.
#[derive(Clone)]
pub struct AppState {
    /// Session state shared by every socket.
    pub hub: Arc<RelayHub>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Cancelled when the server shuts down; open sockets close on it.
    pub shutdown: CancellationToken,
}

/// The relay server: configuration, shared hub and shutdown coordinator.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    hub: Arc<RelayHub>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl RelayServer {
    /// Build a server with a fresh, empty hub.
    pub fn new(config: ServerConfig) -> Self {
        let hub = Arc::new(RelayHub::new(SessionLimits {
            max_phones: config.max_phones_per_session.max(1),
            max_displays: config.max_displays_per_session.max(1),
        }));
        Self {
            config: Arc::new(config),
            hub,
            shutdown: Arc::new(ShutdownCoordinator::new()),
        }
    }

    /// Router with the upgrade handler on every path.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: Arc::clone(&self.hub),
            config: Arc::clone(&self.config),
            shutdown: self.shutdown.token(),
        };
        Router::new().fallback(ws_handler).with_state(state)
    }

    /// Bind, then serve in the background along with the sweep task.
    pub async fn listen(&self) -> Result<ServerHandle> {
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let token = self.shutdown.token();
        let sweeper = start_sweep_task(
            Arc::clone(&self.hub),
            self.config.sweep_interval(),
            token.clone(),
        );

        let router = self.router();
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "relay server stopped with error");
            }
        });

        info!(addr = %local_addr, "relay listening");
        Ok(ServerHandle {
            addr: local_addr,
            server,
            sweeper,
        })
    }

    /// The shared hub.
    pub fn hub(&self) -> &Arc<RelayHub> {
        &self.hub
    }

    /// The active configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The shutdown coordinator driving the listener, sweeper and sockets.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// Background tasks of a listening server.
pub struct ServerHandle {
    addr: SocketAddr,
    server: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

impl ServerHandle {
    /// Address actually bound (resolves port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Task handles for [`ShutdownCoordinator::graceful_shutdown`].
    pub fn into_tasks(self) -> Vec<JoinHandle<()>> {
        vec![self.server, self.sweeper]
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let AppState {
        hub,
        config,
        shutdown,
    } = state;
    ws.max_message_size(config.max_message_size)
        .on_upgrade(move |socket| run_socket(socket, hub, config.send_queue_capacity, shutdown))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn limits_come_from_config() {
        let server = RelayServer::new(ServerConfig {
            max_phones_per_session: 3,
            max_displays_per_session: 0,
            ..test_config()
        });
        let limits = server.hub().limits();
        assert_eq!(limits.max_phones, 3);
        assert_eq!(limits.max_displays, 1);
    }

    #[tokio::test]
    async fn plain_get_is_not_upgraded() {
        let server = RelayServer::new(test_config());
        let response = server
            .router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port() {
        let server = RelayServer::new(test_config());
        let handle = server.listen().await.unwrap();
        assert_ne!(handle.local_addr().port(), 0);
        let clean = server
            .shutdown()
            .graceful_shutdown(handle.into_tasks(), Some(std::time::Duration::from_secs(5)))
            .await;
        assert!(clean);
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let first = RelayServer::new(test_config());
        let handle = first.listen().await.unwrap();
        let taken = RelayServer::new(ServerConfig {
            port: handle.local_addr().port(),
            ..test_config()
        });
        let err = taken.listen().await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { .. }));
        let _ = first.shutdown().graceful_shutdown(handle.into_tasks(), None).await;
    }
}
