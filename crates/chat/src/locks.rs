//! Per-conversation serialization.
//!
//! Two requests for the same `chat_id` would otherwise both read the same
//! history and both append, each blind to the other's turn. Holding a
//! conversation lock across read, generate and write serializes them.
//! Different conversations never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// A registry of async mutexes keyed by conversation.
#[derive(Clone, Default)]
pub struct ConversationLocks {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `chat_id`.
    pub async fn acquire(&self, chat_id: &str) -> ConversationGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.entry(chat_id.to_string()).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        ConversationGuard {
            chat_id: chat_id.to_string(),
            guard: Some(guard),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Number of conversations with a holder or waiter.
    pub fn active(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Held while a conversation is being worked on. Releasing the last
/// reference to a slot removes it from the registry.
pub struct ConversationGuard {
    chat_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Only the registry's own reference left: nobody holds or waits
        if slots
            .get(&self.chat_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.chat_id);
        }
    }
}
