//! Error types surfaced by the session manager.
//!
//! Every variant's `Display` text is short enough to show directly in the UI.

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::store::StoreError;

#[derive(Error, Debug)]
pub enum SessionError {
    /// No usable access token; the request was never sent.
    #[error("Not authenticated - please log in")]
    NoToken,

    /// The server rejected the token at call time. Tokens were cleared and
    /// a logout was broadcast.
    #[error("Authentication failed - session expired")]
    AuthExpired,

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Refresh answered with a success status but without a new access token.
    #[error("Refresh response did not contain an access token")]
    RefreshMalformed,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    /// True for the failures that end the session (tokens cleared).
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, SessionError::NoToken | SessionError::AuthExpired)
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
