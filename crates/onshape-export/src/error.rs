//! Error types for export job operations

/// Errors from submitting, polling, or downloading an export job.
///
/// `Submit` and `Download` carry the upstream status so the caller can
/// propagate it; `JobFailed` carries the provider's failure reason verbatim.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure talking to the document API
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// A 2xx response whose body was not what the API documents
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The submit call was rejected outright. Never retried: a malformed
    /// submission will not succeed on a second attempt.
    #[error("export submission rejected ({status}): {body}")]
    Submit { status: u16, body: String },

    /// The provider reported the job reached terminal failure
    #[error("export job failed: {0}")]
    JobFailed(String),

    /// The job completed but its status payload listed no result artifacts
    #[error("no result artifact in completed translation")]
    MissingArtifact,

    /// Attempt budget exhausted without a terminal phase. The provider-side
    /// job may still finish later; this orchestrator has stopped watching.
    #[error("export job did not finish within {attempts} status checks")]
    TimedOut { attempts: u32 },

    /// Artifact download returned a non-success status
    #[error("artifact download failed ({status}): {body}")]
    Download { status: u16, body: String },
}

/// Result alias for export operations.
pub type Result<T> = std::result::Result<T, Error>;
