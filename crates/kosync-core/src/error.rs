//! Sync error handling
//!
//! Typed errors for sync operations with descriptive messages and
//! recovery suggestions. A missing remote record is not an error: fetches
//! return `Ok(None)` for it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur during sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// The service rejected the credentials (401)
    #[error("Authentication failed: the sync service rejected the credentials (401)")]
    Auth,

    /// The service rejected the payload (400)
    #[error("Request rejected by sync service ({status}): {body}")]
    Validation { status: u16, body: String },

    /// 5xx or any other unexpected status
    #[error("Sync service error ({status}): {body}")]
    Service { status: u16, body: String },

    /// Network failure or timeout below the HTTP layer
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// File could not be read while deriving its document identity
    #[error("Failed to resolve document identity for '{path}': {source}")]
    IdentityResolution {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Response body could not be decoded
    #[error("Failed to decode sync service response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SyncError {
    /// Classify a non-success HTTP status into an error
    ///
    /// 404 is deliberately absent: callers treat it as "no remote record".
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 => SyncError::Auth,
            400 => SyncError::Validation { status, body },
            _ => SyncError::Service { status, body },
        }
    }

    /// Check if retrying the same request later might succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::Service { .. } | SyncError::Transport(_))
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::Auth => {
                Some("Check KOSYNC_USER and KOSYNC_PASSWORD. The password is sent as its MD5 digest.")
            }
            SyncError::Transport(_) => {
                Some("Check your network connection and the configured server_url.")
            }
            SyncError::Service { .. } => Some("The sync service may be unavailable. Try again later."),
            SyncError::IdentityResolution { .. } => {
                Some("Check that the book file exists and is readable.")
            }
            _ => None,
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
