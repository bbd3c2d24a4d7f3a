//! Deploy Broker
//!
//! Provisions bot services on a hosted platform from a pool of platform
//! credentials, picking the least-loaded credential or failing over
//! across the pool.

use anyhow::Result;
use clap::Parser;
use deploy_broker::{
    config::{Environment, Settings},
    server::App,
    services::DispatchMode,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Deploy Broker
///
/// Provisions bot services across a pool of platform credentials.
#[derive(Parser, Debug)]
#[command(name = "deploy-broker")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides PORT env var)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides HOST env var)
    #[arg(long)]
    host: Option<String>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Environment: dev, staging, prod (overrides ENVIRONMENT env var)
    #[arg(short, long)]
    env: Option<Environment>,

    /// Dispatch mode: load_based or blind (overrides DISPATCH_MODE env var)
    #[arg(short, long)]
    mode: Option<String>,

    /// JSON configuration store file (overrides CONFIG_STORE_PATH env var)
    #[arg(long)]
    store_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;

    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }
    if let Some(env) = args.env {
        settings.environment = env;
    }
    if let Some(mode) = args.mode {
        settings.dispatch.mode = DispatchMode::from_str(&mode);
    }
    if let Some(path) = args.store_path {
        settings.store.path = Some(path);
    }
    settings.validate()?;

    init_tracing(&settings.log_level);

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        environment = %settings.environment,
        host = %settings.host,
        port = %settings.port,
        mode = %settings.dispatch.mode,
        "Starting application"
    );

    let app = App::new(settings).await?;
    app.run_with_graceful_shutdown().await?;

    tracing::info!("Application shutdown complete");

    Ok(())
}

/// Initialize the JSON tracing subscriber
fn init_tracing(log_level: &str) {
    // RUST_LOG wins over the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let console_layer = fmt::layer().json().with_filter(filter);

    tracing_subscriber::registry().with(console_layer).init();
}
