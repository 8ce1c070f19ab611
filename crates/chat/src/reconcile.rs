//! Turn reconciliation: build the turns a request produced and persist them.
//!
//! Only attributed requests (non-empty `user_id`) are persisted. Anonymous
//! conversations are answered but leave no trace in the store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use skald_core::{GenerationReply, StoreError, Turn, TurnStore};

/// What happened to a request's turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "count")]
pub enum Persistence {
    /// Anonymous request; nothing written
    Skipped,
    /// This many turns were written in one logical write
    Written(usize),
}

impl Persistence {
    pub fn is_written(&self) -> bool {
        matches!(self, Persistence::Written(_))
    }
}

/// Build the assistant turn for a generation reply.
///
/// Its timestamp is never earlier than `not_before` (the user turn's), so
/// chronological order always puts the reply after the question.
pub fn assistant_turn(
    chat_id: &str,
    user_id: &str,
    reply: &GenerationReply,
    not_before: DateTime<Utc>,
) -> Turn {
    let turn = Turn::assistant(chat_id, reply.content.as_str())
        .with_user_id(user_id)
        .with_image(reply.image.as_deref())
        .with_image_name(reply.image_name.as_deref());
    let timestamp = turn.timestamp.max(not_before);
    turn.at(timestamp)
}

/// Persist `turns` iff `user_id` is non-empty, as a single write.
pub async fn persist(
    store: &dyn TurnStore,
    user_id: &str,
    turns: &[Turn],
) -> Result<Persistence, StoreError> {
    if user_id.is_empty() {
        return Ok(Persistence::Skipped);
    }
    store.insert_many(turns).await?;
    Ok(Persistence::Written(turns.len()))
}
