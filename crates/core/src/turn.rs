//! Turn domain types.
//!
//! A [`Turn`] is the persisted unit: one message exchanged in a conversation.
//! Conversations have no record of their own; they are the turns that share
//! a `chat_id`, ordered by timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The generation service
    Assistant,
}

impl Role {
    /// The stored (wire) form of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Conversation this turn belongs to (never empty)
    pub chat_id: String,

    /// Who sent this turn
    pub role: Role,

    /// The text content
    #[serde(default)]
    pub content: String,

    /// Server-assigned creation time
    pub timestamp: DateTime<Utc>,

    /// Participant identifier; empty means anonymous
    #[serde(default)]
    pub user_id: String,

    /// Opaque image handle (URL or storage key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
}

impl Turn {
    /// Create a new user turn stamped with the current time.
    pub fn user(chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(chat_id, Role::User, content)
    }

    /// Create a new assistant turn stamped with the current time.
    pub fn assistant(chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(chat_id, Role::Assistant, content)
    }

    fn new(chat_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            user_id: String::new(),
            image: None,
            image_name: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Attach an image; empty handles are treated as "no image".
    pub fn with_image(mut self, image: Option<&str>) -> Self {
        self.image = non_empty(image).map(str::to_string);
        self
    }

    pub fn with_image_name(mut self, image_name: Option<&str>) -> Self {
        self.image_name = non_empty(image_name).map(str::to_string);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The image handle, if one is set and non-empty.
    pub fn image(&self) -> Option<&str> {
        non_empty(self.image.as_deref())
    }

    /// Whether this turn was produced by an identified participant.
    pub fn is_attributed(&self) -> bool {
        !self.user_id.is_empty()
    }
}

/// Collapse `Some("")` to `None`.
///
/// Callers and stored records use the empty string and absence
/// interchangeably for optional handles.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
