//! `AppBus` server binary.
//!
//! Serves the invocation, polling and setup endpoints with the built-in
//! `Test` operations registered.

use std::sync::Arc;
use std::time::Duration;

use appbus_server::network::DEFAULT_BASE_PATH;
use appbus_server::{register_builtins, NetworkConfig, NetworkModule, OperationRegistry, ServerConfig};
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Server command line arguments.
#[derive(Parser, Debug)]
#[command(name = "appbus-server")]
#[command(about = "Asynchronous invocation service with ticket polling")]
struct Args {
    /// Bind address
    #[arg(long, env = "APPBUS_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port (0 picks a free port)
    #[arg(long, env = "APPBUS_PORT", default_value_t = 1337)]
    port: u16,

    /// Path prefix of the invocation endpoints
    #[arg(long, env = "APPBUS_BASE_PATH", default_value = DEFAULT_BASE_PATH)]
    base_path: String,

    /// Scheme and authority used in `Location` headers
    #[arg(long, env = "APPBUS_PUBLIC_URL")]
    public_url: Option<String>,

    /// Node identifier reported by /health
    #[arg(long, env = "APPBUS_NODE_ID", default_value = "appbus-0")]
    node_id: String,

    /// Per-invocation timeout in milliseconds
    #[arg(long, env = "APPBUS_INVOCATION_TIMEOUT_MS", default_value_t = 30_000)]
    invocation_timeout_ms: u64,

    /// Maximum number of invocations running at once
    #[arg(long, env = "APPBUS_MAX_CONCURRENT", default_value_t = 64)]
    max_concurrent: u32,

    /// Reject unregistered operations at submission
    #[arg(long, env = "APPBUS_STRICT_RESOLUTION")]
    strict_resolution: bool,

    /// Evict tickets this many seconds after their first fetch
    #[arg(long, env = "APPBUS_RETRIEVED_TTL_SECS")]
    retrieved_ttl_secs: Option<u64>,

    /// Evict completed tickets this many seconds after completion
    #[arg(long, env = "APPBUS_UNCLAIMED_TTL_SECS")]
    unclaimed_ttl_secs: Option<u64>,

    /// Interval between eviction sweeps in milliseconds
    #[arg(long, env = "APPBUS_EVICTION_INTERVAL_MS", default_value_t = 60_000)]
    eviction_interval_ms: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "APPBUS_LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            base_path: self.base_path.clone(),
            public_url: self.public_url.clone(),
            ..NetworkConfig::default()
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            node_id: self.node_id.clone(),
            default_invocation_timeout_ms: self.invocation_timeout_ms,
            max_concurrent_dispatches: self.max_concurrent,
            eviction_interval_ms: self.eviction_interval_ms,
            retrieved_ttl: self.retrieved_ttl_secs.map(Duration::from_secs),
            unclaimed_ttl: self.unclaimed_ttl_secs.map(Duration::from_secs),
            strict_resolution: self.strict_resolution,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "appbus_server=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let registry = OperationRegistry::new();
    register_builtins(&registry);
    info!(operations = ?registry.names(), "operations registered");

    let mut module = NetworkModule::new(
        args.network_config(),
        args.server_config(),
        Arc::new(registry),
    );
    let port = module.start().await?;
    info!(port, node_id = %args.node_id, "Starting appbus-server");

    module.serve(shutdown_signal()).await?;
    info!("appbus-server stopped");
    Ok(())
}
