//! Traffic Gate for Zentinel
//!
//! Serves the visitor check and blog catalog over HTTP.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zentinel_traffic_gate::server::{self, AppState};
use zentinel_traffic_gate::{BlogCatalog, GateConfig, MemoryStore, RedirectEngine};

#[derive(Parser, Debug)]
#[command(name = "zentinel-traffic-gate")]
#[command(author, version, about = "Visitor classification and redirect gate for Zentinel")]
struct Args {
    /// Address to listen on (overrides server.listen)
    #[arg(short, long)]
    listen: Option<String>,

    /// Path to configuration file (JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to blog catalog (built-in posts are used if missing)
    #[arg(long, default_value = "data/blog_posts.json")]
    blog_posts: PathBuf,

    /// External offer URL (overrides routing.offer_url)
    #[arg(long)]
    offer_url: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(json: bool, level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let env_filter = EnvFilter::from_default_env()
        .add_directive(level.into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }
}

fn load_config(path: &Path) -> Result<GateConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, &args.log_level);

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(offer_url) = args.offer_url {
        config.routing.offer_url = offer_url;
    }
    config.validate()?;

    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(RedirectEngine::new(&config, store)?);
    let catalog = Arc::new(BlogCatalog::load(&args.blog_posts)?);
    info!(
        posts = catalog.len(),
        offer_url = %config.routing.offer_url,
        marker = %config.routing.qualifying_marker,
        "Traffic gate initialised"
    );

    let listener = TcpListener::bind(&config.server.listen).await?;
    let state = AppState::new(&config, engine, catalog);
    server::serve(listener, state, shutdown_signal()).await?;

    info!("Traffic gate shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
