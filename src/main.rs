//! echo-relay: WebSocket relay binary.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use clap::Parser;
use echo_server::{RelayServer, ServerConfig, wait_for_signal};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

/// Session relay between one display and many phones.
#[derive(Parser, Debug)]
#[command(name = "echo-relay", version, about = "Session relay between one display and many phones")]
struct Cli {
    /// Host to bind (overrides `RELAY_HOST`).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides `PORT`; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Seconds between empty-session sweeps.
    #[arg(long)]
    sweep_interval_secs: Option<u64>,

    /// Phones allowed per session.
    #[arg(long)]
    max_phones: Option<usize>,

    /// Displays allowed per session.
    #[arg(long)]
    max_displays: Option<usize>,

    /// Serve Prometheus metrics on this port (disabled when unset).
    #[arg(long, env = "RELAY_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Environment-derived config with CLI flags applied on top.
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::from_env();
        self.apply(&mut config);
        config
    }

    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(secs) = self.sweep_interval_secs {
            config.sweep_interval_secs = secs.max(1);
        }
        if let Some(n) = self.max_phones {
            config.max_phones_per_session = n.max(1);
        }
        if let Some(n) = self.max_displays {
            config.max_displays_per_session = n.max(1);
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn install_metrics_exporter(port: u16) -> Result<()> {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to start metrics exporter on {addr}"))?;
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_json);

    if let Some(port) = args.metrics_port {
        install_metrics_exporter(port)?;
    }

    let config = args.server_config();
    tracing::info!(
        host = %config.host,
        port = config.port,
        max_phones = config.max_phones_per_session,
        max_displays = config.max_displays_per_session,
        "starting echo relay"
    );

    let server = RelayServer::new(config);
    let handle = server.listen().await.context("Failed to start relay server")?;
    tracing::info!(addr = %handle.local_addr(), "echo relay ready");

    wait_for_signal().await;
    tracing::info!("shutting down");
    if !server.shutdown().graceful_shutdown(handle.into_tasks(), None).await {
        tracing::warn!("some relay tasks did not stop in time");
    }
    Ok(())
}
