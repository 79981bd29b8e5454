mod app_state;
mod config;

use ampstop_api::create_app;
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::{LogFormat, VenueConfig};

/// Command line arguments for the ampstop server
#[derive(Parser, Debug)]
#[command(name = "ampstop")]
#[command(about = "EV charging session and billing service")]
struct Args {
    /// Path to the venue configuration JSON file
    #[arg(short, long)]
    config: PathBuf,

    /// Port to bind the server to, overrides the configuration file
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_tracing(config: &VenueConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = VenueConfig::load(&args.config).await?;
    init_tracing(&config);

    tracing::info!(
        venue = %config.venue_name,
        stations = config.stations.len(),
        notify_on = ?config.notify_on,
        "Loaded venue config from {}",
        args.config.display()
    );

    let port = args.port.unwrap_or(config.port);
    let state = AppState::new(config)?;
    let bind_addr = format!("0.0.0.0:{port}");
    tracing::info!(venue = %state.config.venue_name, "Starting server on {}", bind_addr);
    let app = create_app(state.engine);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {bind_addr}"))?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
