// Error types for the cloud client.

use std::fmt;
use thiserror::Error;

/// Result type alias used across the library.
pub type Result<T> = std::result::Result<T, CloudError>;

/// Which half of the two-phase upload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    /// Raw byte PUT to the upload host.
    Push,
    /// Metadata registration via `/file/add`.
    Confirm,
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadPhase::Push => f.write_str("push"),
            UploadPhase::Confirm => f.write_str("confirm"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CloudError {
    /// Network or TLS failure reported by the transport.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Login handshake or token issuance failed.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A response decoded fine but did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Protocol(String),

    /// The API answered a signed call with a non-2xx status.
    #[error("API error (status {status}): {body}")]
    Api {
        status: u16,
        body: serde_json::Value,
    },

    #[error("Upload failed during {phase}: {message}")]
    Upload { phase: UploadPhase, message: String },

    #[error("Download failed with status {status}")]
    Download { status: u16 },

    #[error("Invalid remote path: {0}")]
    InvalidPath(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloudError {
    pub fn upload(phase: UploadPhase, message: impl Into<String>) -> Self {
        CloudError::Upload {
            phase,
            message: message.into(),
        }
    }

    /// True for failures that happened below the HTTP layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, CloudError::Transport(_))
    }
}

impl From<reqwest::Error> for CloudError {
    fn from(err: reqwest::Error) -> Self {
        CloudError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_error_names_phase() {
        let err = CloudError::upload(UploadPhase::Confirm, "status 409");
        assert_eq!(err.to_string(), "Upload failed during confirm: status 409");
    }

    #[test]
    fn transport_classification() {
        assert!(CloudError::Transport("reset".into()).is_transport());
        assert!(!CloudError::Download { status: 404 }.is_transport());
    }
}
