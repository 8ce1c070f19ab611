//! Error types for the Skald domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context (store, generation) has its own error enum;
//! [`Error::kind`] flattens them into the taxonomy the HTTP surface reports.

use thiserror::Error;

/// The top-level error type for all Skald operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller errors ---
    #[error("Bad request: {0}")]
    BadRequest(String),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Generation service errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Deadlines ---
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds, as seen by callers of the chat surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    StoreUnavailable,
    PersistenceFailed,
    DecodeFailed,
    GenerationUnavailable,
    GenerationResponseInvalid,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::PersistenceFailed => "persistence_failed",
            ErrorKind::DecodeFailed => "decode_failed",
            ErrorKind::GenerationUnavailable => "generation_unavailable",
            ErrorKind::GenerationResponseInvalid => "generation_response_invalid",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error into the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadRequest(_) => ErrorKind::BadRequest,
            Error::Store(StoreError::Unavailable(_) | StoreError::MigrationFailed(_)) => {
                ErrorKind::StoreUnavailable
            }
            Error::Store(StoreError::WriteFailed(_)) => ErrorKind::PersistenceFailed,
            Error::Store(StoreError::Decode { .. }) => ErrorKind::DecodeFailed,
            Error::Generation(GenerationError::Unavailable(_)) => ErrorKind::GenerationUnavailable,
            Error::Generation(GenerationError::ResponseInvalid(_)) => {
                ErrorKind::GenerationResponseInvalid
            }
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Config { .. } => ErrorKind::Internal,
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Record {position} could not be decoded: {reason}")]
    Decode { position: usize, reason: String },

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Generation service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid response from generation service: {0}")]
    ResponseInvalid(String),
}
