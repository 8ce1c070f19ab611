//! Store trait: the durable, queryable collection of turns.
//!
//! The store is an opaque ordered-record store keyed by conversation and by
//! participant. Reads return records in store-natural (insertion) order;
//! callers that need chronological order sort themselves.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::turn::Turn;

/// A stored record that could not be decoded into a [`Turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Position of the record in the store's result set
    pub position: usize,

    /// Why decoding failed
    pub reason: String,
}

/// The outcome of a store read: every record either decoded or rejected.
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    /// Decoded turns, in store-natural order
    pub turns: Vec<Turn>,

    /// Records that could not be decoded
    pub rejected: Vec<RejectedRecord>,
}

impl RecordBatch {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns,
            rejected: Vec::new(),
        }
    }

    /// Apply a decode policy, yielding the usable turns and the skipped count.
    ///
    /// Under [`DecodePolicy::FailFast`] the first rejected record becomes a
    /// [`StoreError::Decode`].
    pub fn settle(self, policy: DecodePolicy) -> Result<(Vec<Turn>, usize), StoreError> {
        match (policy, self.rejected.first()) {
            (_, None) => Ok((self.turns, 0)),
            (DecodePolicy::FailFast, Some(first)) => Err(StoreError::Decode {
                position: first.position,
                reason: first.reason.clone(),
            }),
            (DecodePolicy::SkipAndReport, Some(_)) => Ok((self.turns, self.rejected.len())),
        }
    }
}

/// What a read does with records that cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Drop bad records and report how many were dropped (default)
    #[default]
    #[serde(alias = "skip")]
    SkipAndReport,
    /// Fail the whole read on the first bad record
    #[serde(alias = "fail")]
    FailFast,
}

/// The core TurnStore trait.
///
/// Implementations: SQLite, in-memory (for testing and ephemeral runs).
/// Must be safe for concurrent use across conversations.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// All records for a conversation, in store-natural order.
    async fn find_by_chat(&self, chat_id: &str) -> Result<RecordBatch, StoreError>;

    /// All records for a participant across conversations.
    async fn find_by_user(&self, user_id: &str) -> Result<RecordBatch, StoreError>;

    /// Persist several turns as one logical write: all or nothing.
    async fn insert_many(&self, turns: &[Turn]) -> Result<(), StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
