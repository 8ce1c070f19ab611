//! Read-only history queries for the HTTP surface.
//!
//! Unlike [`crate::history::History`], results keep the store's natural
//! order; they are not re-sorted.

use skald_core::{DecodePolicy, Error, Result, Turn, TurnStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::service::with_deadline;

/// Turns returned by a query plus how many records were dropped.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub turns: Vec<Turn>,
    pub skipped: usize,
}

pub struct HistoryQuery {
    store: Arc<dyn TurnStore>,
    policy: DecodePolicy,
    timeout: Duration,
}

impl HistoryQuery {
    pub fn new(store: Arc<dyn TurnStore>, policy: DecodePolicy, timeout: Duration) -> Self {
        Self {
            store,
            policy,
            timeout,
        }
    }

    /// Every turn of a conversation. An unknown `chat_id` yields an empty result.
    pub async fn by_chat(&self, chat_id: &str) -> Result<QueryResult> {
        let batch = with_deadline("history read", self.timeout, self.store.find_by_chat(chat_id))
            .await??;
        let (turns, skipped) = batch.settle(self.policy)?;
        if skipped > 0 {
            warn!(chat_id, skipped, "Skipped undecodable records");
        }
        Ok(QueryResult { turns, skipped })
    }

    /// Every turn a participant took part in, across conversations.
    pub async fn by_user(&self, user_id: &str) -> Result<QueryResult> {
        if user_id.is_empty() {
            return Err(Error::BadRequest("user_id is required".into()));
        }
        let batch = with_deadline("history read", self.timeout, self.store.find_by_user(user_id))
            .await??;
        let (turns, skipped) = batch.settle(self.policy)?;
        if skipped > 0 {
            warn!(user_id, skipped, "Skipped undecodable records");
        }
        Ok(QueryResult { turns, skipped })
    }
}
