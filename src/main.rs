use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod clients;
mod codec;
mod config;
mod domain;
mod errors;
mod events;
mod handlers;
mod leaderboard;
mod models;
mod repositories;
mod routes;
mod startup;
mod storage;
mod views;

use crate::config::Config;
use crate::domain::{ImageHost, MemeCatalog, TemplateGenerator};
use crate::leaderboard::LeaderboardView;
use crate::repositories::MemeStateStore;

/// AppState holds what every page reads from: the local store, the cached
/// leaderboard and the external APIs.
pub struct AppState {
    pub store: Arc<MemeStateStore>,
    pub leaderboard: Arc<LeaderboardView>,
    pub catalog: Arc<dyn MemeCatalog>,
    pub templates: Arc<dyn TemplateGenerator>,
    pub image_host: Arc<dyn ImageHost>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "meme_board=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::debug!(
        bind_address = %config.bind_address,
        state_file = %config.state_file.display(),
        "Configuration loaded"
    );

    let (state, _leaderboard_refresher) = startup::build_state(&config)?;
    let app = routes::create_router(state);

    tracing::info!("Listening on http://{}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
