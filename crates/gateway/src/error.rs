//! HTTP error responses.
//!
//! Every failure leaves the gateway as `{"error": kind, "message": reason}`
//! with a status derived from the error kind.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use skald_core::ErrorKind;
use tracing::{error, warn};

use crate::auth::AuthError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// An error on its way to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorKind::BadRequest.as_str(), message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::StoreUnavailable
        | ErrorKind::PersistenceFailed
        | ErrorKind::DecodeFailed
        | ErrorKind::GenerationUnavailable
        | ErrorKind::GenerationResponseInvalid
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<skald_core::Error> for ApiError {
    fn from(err: skald_core::Error) -> Self {
        let kind = err.kind();
        Self::new(status_for(kind), kind.as_str(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Rejected { .. } => StatusCode::BAD_REQUEST,
            AuthError::Unreachable(_) | AuthError::InvalidResponse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), kind = self.kind, message = %self.message, "Request failed");
        } else {
            warn!(status = self.status.as_u16(), kind = self.kind, message = %self.message, "Request rejected");
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.kind.to_string(),
                message: self.message,
            }),
        )
            .into_response()
    }
}
