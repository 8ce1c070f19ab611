//! In-memory store: useful for testing and ephemeral runs.
//!
//! Records are kept as raw JSON documents and decoded on read, the way a
//! document database behaves: a malformed document is only discovered when
//! somebody reads it.

use async_trait::async_trait;
use serde_json::Value;
use skald_core::{RecordBatch, RejectedRecord, StoreError, Turn, TurnStore};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A store that keeps documents in a Vec, in insertion order.
#[derive(Clone)]
pub struct InMemoryTurnStore {
    documents: Arc<RwLock<Vec<Value>>>,
}

impl InMemoryTurnStore {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Append an arbitrary document, bypassing validation.
    ///
    /// Lets tests and import tools seed records that may not decode.
    pub async fn insert_raw(&self, document: Value) {
        self.documents.write().await.push(document);
    }

    /// Number of stored documents, decodable or not.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    async fn find_where(&self, field: &str, value: &str) -> RecordBatch {
        let documents = self.documents.read().await;
        let mut batch = RecordBatch::default();

        let matching = documents
            .iter()
            .filter(|doc| doc.get(field).and_then(Value::as_str) == Some(value));

        for (position, doc) in matching.enumerate() {
            match decode(doc) {
                Ok(turn) => batch.turns.push(turn),
                Err(reason) => batch.rejected.push(RejectedRecord { position, reason }),
            }
        }
        batch
    }
}

impl Default for InMemoryTurnStore {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(doc: &Value) -> Result<Turn, String> {
    let turn: Turn = serde_json::from_value(doc.clone()).map_err(|e| e.to_string())?;
    if turn.chat_id.is_empty() {
        return Err("empty chat_id".into());
    }
    Ok(turn)
}

#[async_trait]
impl TurnStore for InMemoryTurnStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn find_by_chat(&self, chat_id: &str) -> Result<RecordBatch, StoreError> {
        Ok(self.find_where("chat_id", chat_id).await)
    }

    async fn find_by_user(&self, user_id: &str) -> Result<RecordBatch, StoreError> {
        Ok(self.find_where("user_id", user_id).await)
    }

    async fn insert_many(&self, turns: &[Turn]) -> Result<(), StoreError> {
        // Encode everything before touching the collection so a bad turn
        // leaves nothing behind.
        let mut encoded = Vec::with_capacity(turns.len());
        for turn in turns {
            if turn.chat_id.is_empty() {
                return Err(StoreError::WriteFailed("turn has an empty chat_id".into()));
            }
            let doc = serde_json::to_value(turn)
                .map_err(|e| StoreError::WriteFailed(format!("encode turn: {e}")))?;
            encoded.push(doc);
        }

        self.documents.write().await.extend(encoded);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
