//! Error taxonomy shared across the bridge
//!
//! Every way an authentication attempt can end badly maps onto exactly one
//! [`ErrorKind`]. The kind travels with login redirects (`?error=<code>`) and
//! log lines so diagnostics can tell an upstream hang from an explicit rejection
//! even though the user ends up back at the login page either way.

use serde::Serialize;
use std::fmt;

/// Classification of authentication failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The provider path segment is not a supported provider
    InvalidProvider,
    /// `code` or `state` missing or empty on the callback redirect
    MissingCallbackParameters,
    /// No response was received from the backend
    Network,
    /// The backend answered with a non-success status
    HttpError,
    /// The backend answered successfully but the body failed validation
    MalformedResponse,
    /// The attempt exceeded its wall-clock budget
    Timeout,
}

impl ErrorKind {
    /// Stable code used in redirects and logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidProvider => "invalid_provider",
            Self::MissingCallbackParameters => "missing_callback_parameters",
            Self::Network => "network",
            Self::HttpError => "http_error",
            Self::MalformedResponse => "malformed_response",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
