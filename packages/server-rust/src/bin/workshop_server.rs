//! Workshop registration server binary.
//!
//! Serves the HTTP API over an in-memory store. Every flag can also be set
//! through a `WORKSHOP_*` environment variable.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use workshop_server::{NetworkConfig, NetworkModule, ServerConfig, ServiceStack};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address
    #[arg(long, env = "WORKSHOP_HOST", default_value = "0.0.0.0")]
    host: String,

    /// HTTP port (0 picks a free one)
    #[arg(short, long, env = "WORKSHOP_PORT", default_value_t = 8080)]
    port: u16,

    /// Log level, used when RUST_LOG is unset
    #[arg(short, long, env = "WORKSHOP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "WORKSHOP_JSON_LOGS")]
    json_logs: bool,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "WORKSHOP_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Node identifier reported in logs and health
    #[arg(long, env = "WORKSHOP_NODE_ID", default_value = "workshop-1")]
    node_id: String,

    /// Per-operation timeout in milliseconds
    #[arg(long, env = "WORKSHOP_OPERATION_TIMEOUT_MS", default_value_t = 30_000)]
    operation_timeout_ms: u64,

    /// Concurrent operations before load shedding
    #[arg(long, env = "WORKSHOP_MAX_CONCURRENT", default_value_t = 1000)]
    max_concurrent: u32,

    /// Admission rounds before a contended submission is rejected as full
    #[arg(long, env = "WORKSHOP_ADMISSION_ATTEMPTS", default_value_t = 3)]
    admission_attempts: u32,

    /// Reject a second active registration from the same respondent
    #[arg(long, env = "WORKSHOP_REJECT_DUPLICATES")]
    reject_duplicates: bool,

    /// Promote the waitlist head when a cancellation frees a slot
    #[arg(long, env = "WORKSHOP_AUTO_PROMOTE")]
    auto_promote: bool,

    /// Capacity of the notification queue
    #[arg(long, env = "WORKSHOP_NOTIFICATION_QUEUE", default_value_t = 256)]
    notification_queue: usize,

    /// Allowed CORS origins, comma separated
    #[arg(
        long,
        env = "WORKSHOP_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "*"
    )]
    cors_origins: Vec<String>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "WORKSHOP_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            node_id: self.node_id.clone(),
            default_operation_timeout_ms: self.operation_timeout_ms,
            max_concurrent_operations: self.max_concurrent,
            max_admission_attempts: self.admission_attempts,
            reject_duplicate_registrations: self.reject_duplicates,
            auto_promote_waitlist: self.auto_promote,
            notification_queue_capacity: self.notification_queue,
            ..ServerConfig::default()
        }
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..NetworkConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs)?;

    info!("Starting workshop server v{}", env!("CARGO_PKG_VERSION"));

    if let Some(port) = args.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "Prometheus metrics exporter listening");
    }

    let stack = Arc::new(ServiceStack::in_memory(args.server_config()).await?);
    let mut network = NetworkModule::new(args.network_config(), stack);
    let port = network.start().await?;
    info!(port, "workshop server ready");

    network
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl-c: {e}");
            }
            info!("shutdown signal received");
        })
        .await
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow::anyhow!("Invalid log level: {e}"))?;

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_default_values() {
        let args = Args::parse_from(["workshop-server"]);

        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.port, 8080);
        assert_eq!(args.log_level, "info");
        assert!(!args.json_logs);
        assert!(args.metrics_port.is_none());
        assert_eq!(args.cors_origins, vec!["*"]);

        let config = args.server_config();
        assert_eq!(config.max_admission_attempts, 3);
        assert!(!config.reject_duplicate_registrations);
        assert!(!config.auto_promote_waitlist);
    }

    #[test]
    fn args_custom_values() {
        let args = Args::parse_from([
            "workshop-server",
            "--port",
            "9000",
            "--metrics-port",
            "9100",
            "--reject-duplicates",
            "--auto-promote",
            "--admission-attempts",
            "5",
            "--cors-origins",
            "http://a.test,http://b.test",
            "--request-timeout-secs",
            "5",
        ]);

        assert_eq!(args.metrics_port, Some(9100));
        let server = args.server_config();
        assert!(server.reject_duplicate_registrations);
        assert!(server.auto_promote_waitlist);
        assert_eq!(server.max_admission_attempts, 5);

        let network = args.network_config();
        assert_eq!(network.port, 9000);
        assert_eq!(network.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(network.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(Args::try_parse_from(["workshop-server", "--port", "not-a-port"]).is_err());
    }
}
