//! Client for the Baldr generation service.
//!
//! Two endpoints:
//! - `POST {base_url}/chat`: conversational reply, optionally with an image
//! - `POST {inpaint_url}/inpaint`: image edit
//!
//! Exactly one attempt per call. Transport failures are `Unavailable`. The
//! body is decoded whatever the status; a body that does not decode is
//! `ResponseInvalid`, carrying the status when it was not a success.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use skald_config::GenerationConfig;
use skald_core::{
    GenerationError, GenerationReply, GenerationRequest, Generator, InpaintReply, InpaintRequest,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Longest error body echoed into logs and error messages.
const MAX_ERROR_BODY: usize = 512;

pub struct BaldrClient {
    base_url: Option<String>,
    inpaint_url: Option<String>,
    client: reqwest::Client,
}

impl BaldrClient {
    /// Create a client. Either URL may be absent; calls to an unconfigured
    /// endpoint fail with `Unavailable`.
    pub fn new(
        base_url: Option<&str>,
        inpaint_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Unavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.map(normalize),
            inpaint_url: inpaint_url.map(normalize),
            client,
        })
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        Self::new(
            config.base_url.as_deref(),
            config.inpaint_url.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn post_json<Req, Resp>(&self, url: &str, body: &Req) -> Result<Resp, GenerationError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Unavailable(format!("reading body: {e}")))?;

        match serde_json::from_slice(&bytes) {
            Ok(reply) => {
                if !status.is_success() {
                    warn!(url, status = status.as_u16(), "Generation service sent a reply with an error status");
                }
                Ok(reply)
            }
            Err(e) if status.is_success() => Err(GenerationError::ResponseInvalid(format!(
                "Failed to parse response: {e}"
            ))),
            Err(_) => {
                let error_body = truncate(&String::from_utf8_lossy(&bytes));
                warn!(url, status = status.as_u16(), body = %error_body, "Generation service returned error");
                Err(GenerationError::ResponseInvalid(format!(
                    "HTTP {}: {error_body}",
                    status.as_u16()
                )))
            }
        }
    }
}

fn normalize(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

#[async_trait]
impl Generator for BaldrClient {
    fn name(&self) -> &str {
        "baldr"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationReply, GenerationError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| GenerationError::Unavailable("generation base URL is not configured".into()))?;
        let url = format!("{base}/chat");

        debug!(
            chat_id = %request.chat_id,
            prompt_len = request.prompt.len(),
            has_image = request.image.is_some(),
            "Sending generation request"
        );

        self.post_json(&url, &request).await
    }

    async fn inpaint(
        &self,
        request: InpaintRequest,
    ) -> std::result::Result<InpaintReply, GenerationError> {
        let base = self
            .inpaint_url
            .as_deref()
            .ok_or_else(|| GenerationError::Unavailable("inpaint URL is not configured".into()))?;
        let url = format!("{base}/inpaint");

        debug!(chat_id = %request.chat_id, "Sending inpaint request");

        self.post_json(&url, &request).await
    }
}
