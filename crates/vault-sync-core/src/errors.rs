use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type Result<T> = std::result::Result<T, SyncError>;

/// Failures surfaced by a [`crate::store::SecretStore`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("vault request failed: {0}")]
    Transport(String),
    #[error("vault returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{path} not found")]
    NotFound { path: String },
    #[error("failed to decode vault response: {0}")]
    Decode(String),
}

/// Errors that abort a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("login to {address} failed: {message}")]
    Auth { address: String, message: String },
    #[error("failed to list {path}: {source}")]
    Enumeration { path: String, source: StoreError },
    #[error("credentials unavailable: {0}")]
    Credentials(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    pub fn auth(address: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Auth {
            address: address.into(),
            message: message.into(),
        }
    }

    /// True for failures that happened before any secret was read.
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Auth { .. })
    }
}
