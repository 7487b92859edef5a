//! An [`EventBroadcaster`] that records events for test assertions

use crate::events::{EventBroadcaster, VaultEvent};
use async_trait::async_trait;
use std::sync::Mutex;

/// Records every broadcast event in arrival order. Never drops events —
/// unlike a production broadcaster, a test double should make a missed
/// assertion loud, not silent.
#[derive(Default)]
pub struct InMemoryBroadcaster {
    events: Mutex<Vec<VaultEvent>>,
}

impl InMemoryBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event recorded so far, in commit order.
    #[must_use]
    pub fn events(&self) -> Vec<VaultEvent> {
        self.events.lock().expect("broadcaster lock poisoned").clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().expect("broadcaster lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventBroadcaster for InMemoryBroadcaster {
    async fn broadcast(&self, event: VaultEvent) {
        self.events.lock().expect("broadcaster lock poisoned").push(event);
    }
}
