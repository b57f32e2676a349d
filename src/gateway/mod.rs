//! Backend authentication gateway
//!
//! The gateway owns every call the bridge makes to the backend API. Each
//! operation takes the request-scoped [`SessionCookies`]: outgoing calls always
//! carry its cookies (the backend needs the state-nonce cookie to validate the
//! OAuth `state`), and response cookies are relayed into it before the caller
//! learns the outcome.

pub mod http;

pub use http::HttpAuthGateway;

use async_trait::async_trait;
use url::Url;

use crate::callback::CallbackRequest;
use crate::cookies::SessionCookies;
use crate::errors::ErrorKind;
use crate::provider::InteractiveProvider;

/// Message shown when the backend could not be reached
pub const NETWORK_READABLE: &str = "Unable to reach the authentication server";

/// Message shown when the backend answered with something unexpected
pub const INTERNAL_READABLE: &str = "Internal Server Error";

/// Classified gateway failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No response was received
    #[error("network error: {0}")]
    Network(String),

    /// A response was received with a non-success status
    #[error("backend returned {status} (code {error_code}): {message}")]
    Http {
        status: u16,
        error_code: i64,
        message: String,
        readable: String,
    },

    /// A success status whose body failed validation
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

impl AuthError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Http { .. } => ErrorKind::HttpError,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
        }
    }

    /// Text safe to show to the end user
    #[must_use]
    pub fn readable(&self) -> &str {
        match self {
            Self::Network(_) => NETWORK_READABLE,
            Self::Http { readable, .. } => readable,
            Self::MalformedResponse(_) => INTERNAL_READABLE,
        }
    }
}

/// Operations the bridge needs from the backend
///
/// Implementations must never retry on their own: authorization codes are
/// single-use and a retried exchange is rejected upstream.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Ask the backend for the provider's authorization URL
    ///
    /// Response cookies (the state nonce) are relayed before the body is
    /// inspected, whatever the status.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] classifying the failure.
    async fn request_authorization_url(
        &self,
        provider: InteractiveProvider,
        cookies: &SessionCookies,
    ) -> Result<Url, AuthError>;

    /// Exchange a callback's code and state for a backend session
    ///
    /// On success the session cookie has been relayed into `cookies` before
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] classifying the failure.
    async fn exchange_callback(
        &self,
        request: CallbackRequest,
        cookies: &SessionCookies,
    ) -> Result<(), AuthError>;

    /// Create a guest session
    ///
    /// Same ordering guarantee as [`AuthGateway::exchange_callback`].
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] classifying the failure.
    async fn create_guest_session(&self, cookies: &SessionCookies) -> Result<(), AuthError>;
}
