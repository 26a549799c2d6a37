//! Error taxonomy for the coordination layer.
//!
//! Nothing here is fatal: the coordinator maps directory failures to a
//! user-facing `last_error`, session failures to a degraded no-op mode, and
//! preference write failures to log entries.

use thiserror::Error;

/// Failures talking to the remote station directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The request exceeded the configured search timeout.
    #[error("directory request timed out")]
    Timeout,

    /// Connection-level failure (DNS, TLS, reset, ...).
    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The directory answered with a non-success status.
    #[error("directory returned status {0}")]
    Status(reqwest::StatusCode),

    /// The payload did not have the expected shape.  Callers treat this as
    /// zero results rather than a hard failure.
    #[error("malformed directory response: {0}")]
    MalformedResponse(String),
}

/// Failures from the background session host.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Attach to the session host failed.  The coordinator stays usable in a
    /// degraded mode where playback commands are no-ops.
    #[error("session attach failed: {0}")]
    Attach(String),

    /// A transport command was rejected or the host is gone.
    #[error("session command failed: {0}")]
    Command(String),
}
