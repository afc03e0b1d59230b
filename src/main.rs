//! Backend gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                   GATEWAY CONTEXT                     │
//!   raw           │  ┌────────────┐   ┌─────────────┐   ┌──────────────┐  │
//!   credential ───┼─▶│   token    │──▶│   client    │──▶│  resilience  │──┼──▶ remote
//!                 │  │  pipeline  │   │    cache    │   │ retry + gate │  │    service
//!                 │  └────────────┘   └─────────────┘   └──────┬───────┘  │
//!                 │                                            │          │
//!                 │                                            ▼          │
//!                 │                                     ┌──────────────┐  │
//!                 │                                     │    health    │  │
//!                 │                                     │ score + CB   │  │
//!                 │                                     └──────────────┘  │
//!                 │  ┌────────────────────────────────────────────────┐  │
//!                 │  │ config · observability · lifecycle · admin API │  │
//!                 │  └────────────────────────────────────────────────┘  │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use backend_gateway::admin::serve_admin;
use backend_gateway::config::watcher::ConfigWatcher;
use backend_gateway::config::{load_config, GatewayConfig};
use backend_gateway::lifecycle::signals::wait_for_signal;
use backend_gateway::observability::{logging, metrics, MetricsTelemetry, NoopTelemetry, TelemetrySink};
use backend_gateway::{GatewayContext, Shutdown};

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "backend-gateway")]
#[command(about = "Resilience and trust gateway for a remote backend service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Disable hot reload of the configuration file
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "backend-gateway starting");
    tracing::info!(
        endpoint = %config.endpoint,
        project_id = %config.project_id,
        max_cache_size = config.max_cache_size,
        max_retries = config.retry_policy.max_retries,
        "Configuration loaded"
    );

    let telemetry: Arc<dyn TelemetrySink> = if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
        Arc::new(MetricsTelemetry)
    } else {
        Arc::new(NoopTelemetry)
    };

    let context = Arc::new(GatewayContext::new(config.clone(), telemetry)?);
    let shutdown = Arc::new(Shutdown::new());
    let mut tasks = context.start(&shutdown);

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = context.clone();
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = serve_admin(state, listener, rx).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }));
    }

    // The watcher stops when dropped at the end of main.
    let _watcher = match (&args.config, args.no_watch) {
        (Some(path), false) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let ctx = context.clone();
            let mut rx = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(new_config) = updates.recv() => ctx.apply_config(new_config),
                        _ = rx.recv() => break,
                    }
                }
            }));
            Some(watcher)
        }
        _ => None,
    };

    wait_for_signal(shutdown.clone()).await;
    shutdown.drain(tasks, SHUTDOWN_DEADLINE).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
