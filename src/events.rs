use serde::Serialize;
use tokio::sync::broadcast;
use tracing;

/// Changes a subscriber may fall behind by before it sees `Lagged`.
pub const CHANNEL_CAPACITY: usize = 64;

/// Published after a mutation has been committed to the key-value store.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    /// Storage keys written by the mutation.
    pub keys: Vec<String>,
}

impl StateChange {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn touches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// Broadcasts state changes to every view that subscribed before the write.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<StateChange>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.sender.subscribe()
    }

    pub fn publish(&self, change: StateChange) {
        // No subscribers is not an error; nothing is listening yet
        match self.sender.send(change) {
            Ok(receivers) => tracing::trace!(receivers, "State change published"),
            Err(broadcast::error::SendError(change)) => {
                tracing::trace!(keys = ?change.keys, "State change published with no subscribers")
            }
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
