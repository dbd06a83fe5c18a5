//! Error types for the gateway.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::auth::claims::DecodeError;
use crate::gateway::coordinator::RefreshFailure;
use crate::session::StorageError;

/// Gateway error type.
///
/// Every failure reaches the original caller through this enum. The auth-layer
/// variants (`SessionExpired`, `AuthDecode`, `Forbidden`, `Refresh`) are produced
/// locally; `Api` and `Http` carry the backend's answer verbatim.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The stored credential expired according to the local clock. Nothing was sent.
    #[error("session expired at {expired_at}")]
    SessionExpired {
        /// Expiry recorded for the credential that was discarded.
        expired_at: DateTime<Utc>,
    },

    /// The stored access token is structurally malformed. Nothing was sent.
    #[error("stored access token could not be decoded: {0}")]
    AuthDecode(#[from] DecodeError),

    /// The decoded role claims lack the role this call requires. Nothing was sent.
    #[error("access denied: the '{required_role}' role is required")]
    Forbidden {
        /// Role the call asked for.
        required_role: String,
    },

    /// The token refresh exchange failed and the session was torn down.
    #[error("token refresh failed: {0}")]
    Refresh(#[from] RefreshFailure),

    /// The backend answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, or a placeholder when it could not be read.
        message: String,
    },

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted credential state could not be read or written.
    #[error("credential storage error: {0}")]
    Storage(#[from] StorageError),

    /// Login succeeded but neither the response nor the token carried any role.
    #[error("login response carried no role claims")]
    MissingRoles,
}

impl GatewayError {
    /// HTTP status carried by the error, if the backend produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Refresh(RefreshFailure::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Whether the error ended the session (credential cleared, login redirect issued).
    pub fn ends_session(&self) -> bool {
        match self {
            Self::SessionExpired { .. } | Self::AuthDecode(_) => true,
            Self::Refresh(failure) => !matches!(failure, RefreshFailure::Abandoned),
            _ => false,
        }
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
