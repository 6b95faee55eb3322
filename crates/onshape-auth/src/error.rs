//! Error types for OAuth flow and session-envelope operations

/// Errors from the OAuth flow: authorize-URL construction, grant-code
/// exchange, and user-info retrieval.
///
/// Non-success provider responses keep their status separate from the body
/// so the gateway can propagate it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint returned {status}: {body}")]
    TokenExchange { status: u16, body: String },

    #[error("session info returned {status}: {body}")]
    UserInfo { status: u16, body: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("session envelope error: {0}")]
    Envelope(String),
}

/// Result alias for OAuth flow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Session-credential verification failures.
///
/// Exactly these cases are distinguished to callers; everything else the
/// envelope can get wrong collapses into `Invalid`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No credential was presented at all (no cookie, no bearer header)
    #[error("no session credential presented")]
    Missing,

    /// The envelope decoded but its signature does not match
    #[error("session credential is invalid")]
    Invalid,

    /// The envelope is authentic but past its embedded expiry
    #[error("session credential has expired")]
    Expired,

    /// The envelope could not be decoded at all
    #[error("session credential is malformed")]
    Malformed,
}
