//! Error types for portfolio-core

use thiserror::Error;

use crate::project::ProjectId;

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Main error type surfaced to callers of the catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Another local mutation is still in flight; retry once it settles
    #[error("A mutation is already in progress")]
    MutationInProgress,

    /// The project is not in the local cache
    #[error("Project not found: {0}")]
    NotFound(ProjectId),

    /// The submitted project or patch is not acceptable
    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote answered a delete with a shape that does not confirm it
    #[error("Delete of project {0} was not acknowledged by the remote")]
    DeleteNotAcknowledged(ProjectId),

    /// The remote collection call failed
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures reported by a remote collection client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network or transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// The remote refused the request (validation, constraint, missing row)
    #[error("Rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The caller is not allowed to perform the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The response could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Decode(err.to_string())
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Realtime envelope decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("{0} event carries no row")]
    MissingRow(&'static str),

    #[error("Delete event carries no id")]
    MissingId,

    #[error("Malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_converts_into_catalog_error() {
        let err: CatalogError = RemoteError::Timeout.into();
        assert!(matches!(err, CatalogError::Remote(RemoteError::Timeout)));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn rejected_display_includes_status() {
        let err = RemoteError::Rejected {
            status: 422,
            message: "businessName is required".into(),
        };
        assert_eq!(err.to_string(), "Rejected (422): businessName is required");
    }
}
