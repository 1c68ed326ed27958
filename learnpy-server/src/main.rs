//! learnpy server binary

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use learnpy_server::{configure, AppState, ServerConfig};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "learnpy-server", version, about = "Python learning platform server")]
struct Cli {
    /// TOML configuration file, layered under the environment
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting learnpy server...");

    let mut config =
        ServerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if config.secret_key.is_none() {
        warn!("SECRET_KEY is not set; using the development signing key");
    }
    info!(
        python = %config.sandbox.python,
        max_concurrent = config.sandbox.max_concurrent,
        time_limit_ms = config.sandbox.time_limit.as_millis() as u64,
        "Configuration loaded"
    );

    let bind_addr = config.bind_address();
    let state = AppState::new(config)
        .await
        .context("Failed to initialize application state")?;
    state
        .seed_admin()
        .await
        .context("Failed to seed administrator account")?;

    let sandbox = state.sandbox.clone();
    let data = web::Data::new(state);

    info!("Starting server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await?;

    // Workers still running are killed and reaped before exit.
    sandbox.shutdown().await;
    info!("Server stopped");

    Ok(())
}
