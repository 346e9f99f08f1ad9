//! Application event bus.
//!
//! A single publish point with any number of subscribers, so facts like
//! "the locale changed" have exactly one source instead of parallel
//! listener chains.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AppEvent {
    /// The active locale changed; payload is the locale tag (e.g. "en-US").
    LocaleChanged(String),
    ConfigReloaded,
    /// The persisted auth record was written or cleared.
    AuthChanged,
    #[serde(other)]
    Unknown,
}

pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning the number of subscribers that saw it.
    pub fn publish(&self, event: AppEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(16)
    }
}
