use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use storeline_gateway::{
    ServerConfig,
    routes::{create_admin_router, create_api_router, create_relay_router},
    state::AppState,
};

/// Storeline Gateway - voice call answering server
#[derive(Parser, Debug)]
#[command(name = "storeline-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to an env file to load before reading configuration
    #[arg(short = 'e', long = "env-file", value_name = "FILE")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load .env (or the given file) before config loading
    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env()?;
    let host = config.host.clone();
    let port = config.port;

    if !config.has_model() {
        warn!("no model key configured; answering from local intents only");
    }
    if !config.has_transfer() {
        warn!("no transfer credentials configured; transfers will speak the fallback number");
    }

    let state = Arc::new(AppState::new(config));

    // Boot-time pricing load is best-effort: a bad source leaves the table
    // empty, it never stops the server from answering calls
    if let Some(source) = state.config.pricing_source.clone() {
        match storeline_gateway::pricing::load(&source, &state.http).await {
            Ok(table) => {
                info!(rows = table.len(), source = %source, "pricing table loaded");
                state.pricing.replace(table);
            }
            Err(e) => warn!(source = %source, "pricing load failed, starting empty: {e}"),
        }
    } else {
        info!("no pricing source configured, starting with an empty table");
    }

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    let app = Router::new()
        .merge(create_api_router())
        .merge(create_admin_router(state.clone()))
        .merge(create_relay_router())
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("storeline-gateway listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
