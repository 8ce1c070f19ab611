//! Generator trait: the abstraction over the external generation service.
//!
//! A Generator takes a composed prompt plus resolved context and returns the
//! assistant's reply, optionally with a generated image. It also fronts the
//! image-inpainting endpoint of the same service.
//!
//! Payloads are typed structs so the wire contract is checked at compile time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// The outbound request for one conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Rendered history plus the new instruction
    pub prompt: String,

    /// Resolved subject identifier (may be empty)
    pub object: String,

    pub chat_id: String,

    /// Participant identifier (may be empty)
    pub user_id: String,

    /// Resolved image handle, omitted when there is none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// The service's reply to a [`GenerationRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationReply {
    /// Reply text
    #[serde(rename = "message")]
    pub content: String,

    /// Generated image handle, if any
    #[serde(rename = "img", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(rename = "img_name", default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
}

/// An image-edit request. Forwarded to the service as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InpaintRequest {
    pub chat_id: String,

    #[serde(default)]
    pub user_id: String,

    /// Edit instruction
    #[serde(default)]
    pub prompt: String,

    /// Source image handle
    pub image: String,

    /// Region to repaint, if the caller supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
}

/// The service's reply to an [`InpaintRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InpaintReply {
    #[serde(rename = "img")]
    pub image: String,
}

/// The core Generator trait.
///
/// Exactly one attempt per call; retries are never made here or by callers.
#[async_trait]
pub trait Generator: Send + Sync {
    /// A human-readable name for this generator (e.g., "baldr").
    fn name(&self) -> &str;

    /// Produce the assistant reply for one turn.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationReply, GenerationError>;

    /// Run an image edit.
    async fn inpaint(
        &self,
        request: InpaintRequest,
    ) -> std::result::Result<InpaintReply, GenerationError>;
}
