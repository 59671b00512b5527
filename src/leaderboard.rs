use crate::{
    codec::{LIKED_MEMES_KEY, TOP_USERS_KEY},
    events::StateChange,
    models::{LeaderboardUser, LikedMemeSummary, UserId},
    repositories::MemeStateStore,
};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing;

pub const DEFAULT_LIMIT: usize = 10;

/// Placeholder users written the first time the leaderboard is read.
pub fn seed_users() -> Vec<LeaderboardUser> {
    [("User1", 120), ("User2", 100), ("User3", 90), ("User4", 80), ("User5", 70)]
        .into_iter()
        .zip(1..)
        .map(|((name, score), id)| LeaderboardUser {
            id: UserId::Number(id),
            name: name.to_string(),
            score,
        })
        .collect()
}

/// Read-only top-N views. Ties keep their stored order.
#[derive(Clone)]
pub struct LeaderboardProjection {
    store: Arc<MemeStateStore>,
}

impl LeaderboardProjection {
    pub fn new(store: Arc<MemeStateStore>) -> Self {
        Self { store }
    }

    /// Idempotent: seeds the users list only when it is absent, `null` or `[]`.
    /// Any other stored value is left alone, readable or not.
    pub fn ensure_seeded(&self) -> bool {
        let seeded = self.store.seed_users_if_empty(&seed_users());
        if seeded {
            tracing::info!("Leaderboard users seeded");
        }
        seeded
    }

    pub fn top_memes(&self, limit: usize) -> Vec<LikedMemeSummary> {
        let mut memes = self.store.liked_memes();
        memes.sort_by(|a, b| b.likes.cmp(&a.likes));
        memes.truncate(limit);
        memes
    }

    pub fn top_users(&self, limit: usize) -> Vec<LeaderboardUser> {
        self.ensure_seeded();
        let mut users = self.store.leaderboard_users();
        users.sort_by(|a, b| b.score.cmp(&a.score));
        users.truncate(limit);
        users
    }

    pub fn snapshot(&self, limit: usize) -> LeaderboardSnapshot {
        LeaderboardSnapshot {
            version: 0,
            top_memes: self.top_memes(limit),
            top_users: self.top_users(limit),
        }
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaderboardSnapshot {
    /// Number of refreshes the view has applied since it was mounted.
    pub version: u64,
    pub top_memes: Vec<LikedMemeSummary>,
    pub top_users: Vec<LeaderboardUser>,
}

/// Leaderboard page state, recomputed whenever liked memes or users change.
pub struct LeaderboardView {
    projection: LeaderboardProjection,
    snapshot: RwLock<LeaderboardSnapshot>,
}

impl LeaderboardView {
    /// Subscribes before computing the first snapshot so no change is missed,
    /// then spawns the refresh loop.
    pub fn mount(
        projection: LeaderboardProjection,
        changes: broadcast::Receiver<StateChange>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let view = Arc::new(Self {
            snapshot: RwLock::new(projection.snapshot(DEFAULT_LIMIT)),
            projection,
        });
        let handle = tokio::spawn(Arc::clone(&view).listen(changes));
        (view, handle)
    }

    pub fn snapshot(&self) -> LeaderboardSnapshot {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn refresh(&self) {
        let mut next = self.projection.snapshot(DEFAULT_LIMIT);
        let mut current = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        next.version = current.version + 1;
        *current = next;
    }

    async fn listen(self: Arc<Self>, mut changes: broadcast::Receiver<StateChange>) {
        loop {
            match changes.recv().await {
                Ok(change) if change.touches(LIKED_MEMES_KEY) || change.touches(TOP_USERS_KEY) => {
                    tracing::debug!(keys = ?change.keys, "Refreshing leaderboard");
                    self.refresh();
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // The store is authoritative, so one refresh covers every skipped change
                    tracing::warn!(skipped, "Leaderboard fell behind, refreshing");
                    self.refresh();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Change channel closed, leaderboard view unmounted");
                    break;
                }
            }
        }
    }
}
