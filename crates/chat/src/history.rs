//! History assembly: load a conversation and resolve its context.
//!
//! A conversation is every turn sharing a `chat_id`, ordered by timestamp.
//! From it we resolve the image the next generation should see and the
//! subject (the participant) the request is about.

use skald_core::{DecodePolicy, Result, Role, Turn, TurnStore, non_empty};
use tracing::warn;

/// A conversation's turns in chronological order.
#[derive(Debug, Clone, Default)]
pub struct History {
    turns: Vec<Turn>,

    /// Records dropped under [`DecodePolicy::SkipAndReport`]
    skipped: usize,
}

impl History {
    /// Build from turns in any order. The sort is stable, so turns with equal
    /// timestamps keep their store order.
    pub fn from_turns(mut turns: Vec<Turn>) -> Self {
        turns.sort_by_key(|t| t.timestamp);
        Self { turns, skipped: 0 }
    }

    /// Read a conversation from the store and order it.
    pub async fn load(store: &dyn TurnStore, chat_id: &str, policy: DecodePolicy) -> Result<Self> {
        let batch = store.find_by_chat(chat_id).await?;
        let (turns, skipped) = batch.settle(policy)?;
        if skipped > 0 {
            warn!(chat_id, skipped, "Skipped undecodable records in conversation history");
        }
        Ok(Self {
            skipped,
            ..Self::from_turns(turns)
        })
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The image for the next generation: the explicit one if non-empty,
    /// otherwise the most recent non-empty image in the history.
    pub fn resolve_image<'a>(&'a self, explicit: Option<&'a str>) -> Option<&'a str> {
        non_empty(explicit).or_else(|| self.turns.iter().rev().find_map(Turn::image))
    }

    /// The subject of the request: the explicit one if non-empty, otherwise
    /// the `user_id` of the most recent attributed user turn, searching the
    /// pending turn first and then the history.
    pub fn resolve_subject<'a>(&'a self, explicit: Option<&'a str>, pending: &'a Turn) -> &'a str {
        if let Some(subject) = non_empty(explicit) {
            return subject;
        }
        std::iter::once(pending)
            .chain(self.turns.iter().rev())
            .find(|t| t.role == Role::User && t.is_attributed())
            .map(|t| t.user_id.as_str())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use skald_store::InMemoryTurnStore;

    fn at(secs: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn sorts_by_timestamp_stably() {
        let history = History::from_turns(vec![
            Turn::user("c1", "third").at(at(3)),
            Turn::user("c1", "first-a").at(at(1)),
            Turn::user("c1", "first-b").at(at(1)),
            Turn::user("c1", "second").at(at(2)),
        ]);
        let contents: Vec<_> = history.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["first-a", "first-b", "second", "third"]);
    }

    #[test]
    fn image_falls_back_to_most_recent_in_history() {
        let history = History::from_turns(vec![
            Turn::user("c1", "hi").at(at(1)).with_image(Some("old.png")),
            Turn::assistant("c1", "hello").at(at(2)).with_image(Some("x.png")),
            Turn::user("c1", "thanks").at(at(3)),
        ]);
        assert_eq!(history.resolve_image(None), Some("x.png"));
        assert_eq!(history.resolve_image(Some("")), Some("x.png"));
        assert_eq!(history.resolve_image(Some("new.png")), Some("new.png"));
    }

    #[test]
    fn no_image_anywhere_resolves_to_none() {
        let history = History::from_turns(vec![Turn::user("c1", "hi").at(at(1))]);
        assert_eq!(history.resolve_image(None), None);
        assert_eq!(History::default().resolve_image(Some("")), None);
    }

    #[test]
    fn subject_prefers_explicit_then_pending_then_history() {
        let history = History::from_turns(vec![
            Turn::user("c1", "a").at(at(1)).with_user_id("alice"),
            Turn::assistant("c1", "b").at(at(2)).with_user_id("bot"),
        ]);
        let anonymous = Turn::user("c1", "c");
        let attributed = Turn::user("c1", "c").with_user_id("bob");

        assert_eq!(history.resolve_subject(Some("topic"), &attributed), "topic");
        assert_eq!(history.resolve_subject(None, &attributed), "bob");
        assert_eq!(history.resolve_subject(Some(""), &anonymous), "alice");
    }

    #[test]
    fn subject_ignores_assistant_turns() {
        let history = History::from_turns(vec![
            Turn::assistant("c1", "b").at(at(2)).with_user_id("bot"),
        ]);
        assert_eq!(history.resolve_subject(None, &Turn::user("c1", "c")), "");
    }

    #[tokio::test]
    async fn load_orders_and_counts_skipped() {
        let store = InMemoryTurnStore::new();
        store
            .insert_many(&[
                Turn::user("c1", "later").at(at(5)),
                Turn::user("c1", "earlier").at(at(1)),
            ])
            .await
            .unwrap();
        store
            .insert_raw(serde_json::json!({"chat_id": "c1", "role": "narrator"}))
            .await;

        let history = History::load(&store, "c1", DecodePolicy::SkipAndReport)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.skipped(), 1);
        assert_eq!(history.turns()[0].content, "earlier");
    }

    #[tokio::test]
    async fn load_fails_fast_when_asked() {
        let store = InMemoryTurnStore::new();
        store
            .insert_raw(serde_json::json!({"chat_id": "c1", "role": "narrator"}))
            .await;

        let err = History::load(&store, "c1", DecodePolicy::FailFast)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), skald_core::ErrorKind::DecodeFailed);
    }
}
