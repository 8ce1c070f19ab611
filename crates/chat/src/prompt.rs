//! Prompt composition.
//!
//! Renders the conversation as plain text for the generation service:
//!
//! ```text
//! Chat history:
//! User: hi
//! Assistant: hello
//! User: more
//!
//! Prompt: more
//! ```
//!
//! Composition is pure: identical inputs always give byte-identical output.

use skald_core::{Role, Turn};

const HEADER: &str = "Chat history:\n";

/// Render `history` followed by the `pending` turn, then the raw instruction.
pub fn compose(history: &[Turn], pending: &Turn, message: &str) -> String {
    let mut prompt = String::from(HEADER);
    for turn in history.iter().chain(std::iter::once(pending)) {
        prompt.push_str(&label(turn.role));
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }
    prompt.push_str("\nPrompt: ");
    prompt.push_str(message);
    prompt
}

/// Display label for a role: the stored form with its first letter upper-cased.
fn label(role: Role) -> String {
    let mut chars = role.as_str().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
