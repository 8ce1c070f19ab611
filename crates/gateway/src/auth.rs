//! OAuth authorization-code exchange.
//!
//! `POST /auth` takes the code the browser received and trades it for
//! tokens at the provider's token endpoint. The provider's payload is
//! returned untouched. Codes and tokens are never logged.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use skald_config::OAuthConfig;
use std::time::Duration;
use tracing::{info, warn};

use crate::SharedState;
use crate::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("OAuth is not configured")]
    NotConfigured,

    #[error("Token endpoint rejected the code (HTTP {status})")]
    Rejected { status: u16 },

    #[error("Token endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Token endpoint returned an invalid body: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::NotConfigured => "oauth_not_configured",
            AuthError::Rejected { .. } => "oauth_rejected",
            AuthError::Unreachable(_) => "oauth_unreachable",
            AuthError::InvalidResponse(_) => "oauth_invalid_response",
        }
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'static str,
}

/// Exchanges authorization codes at a fixed token endpoint.
pub struct OAuthExchanger {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
}

impl OAuthExchanger {
    /// Build from config. `Ok(None)` when client id or secret is missing.
    pub fn from_config(config: &OAuthConfig) -> Result<Option<Self>, AuthError> {
        let (Some(client_id), Some(client_secret)) = (&config.client_id, &config.client_secret)
        else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AuthError::Unreachable(format!("HTTP client: {e}")))?;

        Ok(Some(Self {
            client,
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            redirect_uri: config.redirect_uri.clone().unwrap_or_default(),
            token_url: config.token_url.clone(),
        }))
    }

    /// Trade `code` for the provider's token payload.
    pub async fn exchange(&self, code: &str) -> Result<serde_json::Value, AuthError> {
        let body = TokenRequest {
            code,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            redirect_uri: &self.redirect_uri,
            grant_type: "authorization_code",
        };

        let response = self
            .client
            .post(&self.token_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "OAuth token exchange rejected");
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        let tokens = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        info!("OAuth token exchange succeeded");
        Ok(tokens)
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub code: String,
}

pub async fn auth_handler(
    State(state): State<SharedState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = payload?;
    let exchanger = state.oauth.as_ref().ok_or(AuthError::NotConfigured)?;
    if request.code.is_empty() {
        return Err(ApiError::bad_request("code is required"));
    }
    let tokens = exchanger.exchange(&request.code).await?;
    Ok(Json(tokens))
}
