//! Tiergate - access gate for a paid feature tier
//!
//! Architecture:
//! - Anonymous visitor id and signed pro entitlement, both carried in cookies
//! - Daily free quota counted in Upstash Redis, with a process-local fallback
//! - Axum for HTTP API with rate limiting
//! - Tokio for async runtime

mod config;
mod cookie;
mod error;
mod generator;
mod plugins;
mod prelude;
mod state;
mod store;
mod sv;
mod utils;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  config::Config,
  plugins::{App, cron, server},
  prelude::*,
  state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "tiergate=debug,tower_http=debug,axum=trace".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  info!("Starting Tiergate v{}", env!("CARGO_PKG_VERSION"));

  let config = Config::from_env();
  config.report();

  let app = Arc::new(AppState::new(config)?);

  App::new()
    .register(server::Plugin)
    .register(cron::Housekeeping)
    .run(app);

  tokio::signal::ctrl_c().await.context("Failed to listen for shutdown")?;
  info!("Shutting down");

  Ok(())
}
