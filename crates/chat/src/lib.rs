//! Conversation orchestration for Skald.
//!
//! A turn flows through four stages:
//!
//! 1. **History**: load the conversation and order it by timestamp
//! 2. **Resolve**: pick the image and subject the generator should see
//! 3. **Generate**: render the prompt and call the generation service
//! 4. **Reconcile**: persist the user and assistant turns, for attributed
//!    requests only
//!
//! [`ChatService`] drives the stages; [`HistoryQuery`] serves the read-only
//! history endpoints.

pub mod history;
pub mod locks;
pub mod prompt;
pub mod query;
pub mod reconcile;
pub mod service;

#[cfg(test)]
mod test_helpers;

pub use history::History;
pub use locks::{ConversationGuard, ConversationLocks};
pub use query::{HistoryQuery, QueryResult};
pub use reconcile::Persistence;
pub use service::{ChatOptions, ChatRequest, ChatService, INPAINT_REPLY, InpaintOutcome, TurnOutcome};
