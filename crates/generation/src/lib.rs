//! Generation service clients for Skald.
//!
//! All clients implement the `skald_core::Generator` trait.

pub mod baldr;

pub use baldr::BaldrClient;
