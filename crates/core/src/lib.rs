//! # Skald Core
//!
//! Domain types, traits, and error definitions for the Skald conversational
//! backend. This crate has **no framework dependencies**; it defines the
//! domain model that the store, generation, chat and gateway crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Both external collaborators are traits defined here:
//! - [`TurnStore`]: the durable, queryable collection of turns
//! - [`Generator`]: the external generation service
//!
//! Implementations live in their own crates and are passed in by
//! constructor, so tests substitute in-memory fakes.

pub mod error;
pub mod generation;
pub mod store;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ErrorKind, GenerationError, Result, StoreError};
pub use generation::{
    GenerationReply, GenerationRequest, Generator, InpaintReply, InpaintRequest,
};
pub use store::{DecodePolicy, RecordBatch, RejectedRecord, TurnStore};
pub use turn::{Role, Turn, non_empty};
