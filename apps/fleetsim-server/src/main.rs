mod api;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use fleetsim_engine::{Engine, EngineConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fleetsim-server", about = "Serve a simulated robot fleet over HTTP and WebSocket")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 4000)]
    port: u16,

    /// Milliseconds between ticks (at least 100)
    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(100..))]
    interval_ms: u64,

    /// Number of bots to simulate
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    fleet_size: u64,

    /// Number of starter tasks in the queue
    #[arg(long, default_value_t = 4)]
    initial_tasks: usize,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Start with the tick scheduler stopped
    #[arg(long)]
    no_autostart: bool,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_millis(self.interval_ms),
            fleet_size: self.fleet_size as usize,
            initial_tasks: self.initial_tasks,
            seed: self.seed,
            autostart: !self.no_autostart,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let engine = Engine::new(cli.engine_config()).context("failed to build engine")?;

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cli.host, cli.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        bots = engine.bots().len(),
        running = engine.is_running(),
        "fleetsim-server listening"
    );

    axum::serve(listener, api::router(engine.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    engine.stop();
    tracing::info!("fleetsim-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
