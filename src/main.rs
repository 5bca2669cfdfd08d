//! s3hookproxy: a transparent HTTP reverse proxy that sits in front of an
//! S3-compatible object store and runs object payloads through a
//! pluggable, ordered hook pipeline on upload and download.

use anyhow::{Context, Result};
use clap::Parser;
use s3proxy_config::ProxyConfig;
use s3proxy_hooks::EventRegistry;
use s3proxy_proxy::{register_default_hooks, router, AppState, UpstreamClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "s3hookproxy")]
#[command(author, version, about = "HTTP reverse proxy that runs S3 payloads through a hook pipeline")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// Log level, overrides PROXY_LOG_LEVEL
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ProxyConfig::from_env().context("Failed to load configuration")?;

    let level = match cli
        .log_level
        .as_deref()
        .unwrap_or(&config.log_level)
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    runtime.block_on(run(config, cli.port))
}

async fn run(config: ProxyConfig, port: u16) -> Result<()> {
    info!(environment = %config.environment, "Starting s3hookproxy");

    let events = Arc::new(EventRegistry::new());
    register_default_hooks(&events, &config.secret).context("Failed to register default hooks")?;
    info!("Default encrypt/decrypt hooks registered");

    let upstream = Arc::new(UpstreamClient::new(
        config.object_store_host.clone(),
        config.object_store_port,
        config.object_store_ssl_enabled,
    ));
    info!(
        host = %config.object_store_host,
        port = config.object_store_port,
        ssl = config.object_store_ssl_enabled,
        "Upstream object store configured"
    );

    let state = AppState {
        events,
        upstream,
        allowed_methods: Arc::new(config.allowed_methods.clone()),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(address = %addr, "Listening");
    axum::serve(listener, router(state).into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}
