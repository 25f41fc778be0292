//! # Courier Server
//!
//! Realtime mentor/mentee messaging service.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (reads ./courier.toml when present)
//! courier
//!
//! # Run with environment variables
//! COURIER_PORT=8080 COURIER_DATABASE_URL=sqlite://courier.db courier
//! ```

mod config;
mod error;
mod handlers;
mod identity;
mod metrics;
mod ws;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Courier server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
