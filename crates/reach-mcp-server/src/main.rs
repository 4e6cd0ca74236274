use anyhow::{Context, Result};
use clap::Parser;
use reach_core::config::Credentials;
use reach_core::providers::Providers;
use reach_mcp_server::config;
use reach_mcp_server::server::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Use in-memory providers instead of the real marketing APIs.
    #[arg(long)]
    sandbox: bool,

    /// Do not start the metrics and significance pollers.
    #[arg(long)]
    no_monitor: bool,
}

use tracing_subscriber::{fmt, EnvFilter};

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(std::io::stderr) // stdout carries the protocol
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = config::ServerConfig::from_env();
    cfg.sandbox |= args.sandbox;

    init_logging(&cfg.log_level);

    let providers = if cfg.sandbox {
        Providers::sandbox()
    } else {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.http_timeout_ms))
            .user_agent(concat!("reach-mcp-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Providers::from_credentials(&Credentials::from_env(), http)
    };

    tracing::info!(
        event = "server_start",
        sandbox = cfg.sandbox,
        monitor = !args.no_monitor,
        providers = ?providers.configured(),
        config = ?cfg
    );

    Server::run(cfg, providers, !args.no_monitor).await
}
