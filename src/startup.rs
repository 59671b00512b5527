use crate::{
    clients::{create_collaborators, create_http_client},
    config::Config,
    domain::KeyValueStore,
    events::ChangeNotifier,
    leaderboard::{LeaderboardProjection, LeaderboardView},
    repositories::MemeStateStore,
    storage::{FileStore, MemoryStore},
    AppState,
};
use anyhow::Context;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing;

/// `STATE_FILE` value selecting a throwaway in-memory store.
pub const IN_MEMORY: &str = ":memory:";

/// Opens local state, seeds the leaderboard, mounts the leaderboard view and
/// wires the external collaborators.
pub fn build_state(config: &Config) -> anyhow::Result<(Arc<AppState>, JoinHandle<()>)> {
    tracing::info!("Startup: Opening local state...");
    let kv: Arc<dyn KeyValueStore> = if config.state_file.as_os_str() == IN_MEMORY {
        tracing::warn!("Startup: Using in-memory state, nothing will be persisted.");
        Arc::new(MemoryStore::new())
    } else {
        let file = FileStore::open(&config.state_file).with_context(|| {
            format!("Startup: Failed to open state file {}", config.state_file.display())
        })?;
        tracing::info!(path = %file.path().display(), "Startup: Local state ready.");
        Arc::new(file)
    };

    let store = Arc::new(MemeStateStore::new(kv, ChangeNotifier::new()));

    let projection = LeaderboardProjection::new(store.clone());
    projection.ensure_seeded();
    let (leaderboard, refresher) =
        LeaderboardView::mount(projection, store.notifier().subscribe());

    let client = create_http_client().context("Startup: Failed to build HTTP client")?;
    let (catalog, templates, image_host) = create_collaborators(config, client);

    let state = Arc::new(AppState {
        store,
        leaderboard,
        catalog: Arc::new(catalog),
        templates: Arc::new(templates),
        image_host: Arc::new(image_host),
    });
    Ok((state, refresher))
}
