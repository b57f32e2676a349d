//! Callback redirect parsing and validation
//!
//! The provider redirects the browser back with `code` and `state`. These are
//! checked at the page boundary, before anything touches the network: a
//! redirect that fails here costs nothing but a bounce to the login page.

use log::{debug, error};
use serde::Deserialize;

use crate::errors::ErrorKind;
use crate::models::ExchangeCallbackBody;
use crate::provider::{InteractiveProvider, Provider};
use crate::utils::headers::ClientInfo;

/// Query string of the callback redirect
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by providers when the user denied consent
    pub error: Option<String>,
}

/// Reasons a callback redirect is turned away before any backend call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallbackRejection {
    #[error("unsupported provider {0:?}")]
    InvalidProvider(String),
    #[error("guest sessions do not use the OAuth callback")]
    GuestProvider,
    #[error("callback is missing the code or state parameter")]
    MissingParameters,
}

impl CallbackRejection {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidProvider(_) | Self::GuestProvider => ErrorKind::InvalidProvider,
            Self::MissingParameters => ErrorKind::MissingCallbackParameters,
        }
    }
}

/// One exchange attempt's worth of callback data
///
/// Deliberately not `Clone`: the authorization code is single-use, and the
/// request is consumed by value by the one exchange call made with it.
#[derive(Debug, PartialEq, Eq)]
pub struct CallbackRequest {
    provider: InteractiveProvider,
    code: String,
    state: String,
    client_fingerprint: String,
    client_ip: String,
}

impl CallbackRequest {
    /// Build a request from already-validated parts
    ///
    /// # Errors
    ///
    /// Returns [`CallbackRejection::MissingParameters`] if any field is empty
    /// or whitespace.
    pub fn new(
        provider: InteractiveProvider,
        code: impl Into<String>,
        state: impl Into<String>,
        client_fingerprint: impl Into<String>,
        client_ip: impl Into<String>,
    ) -> Result<Self, CallbackRejection> {
        let request = Self {
            provider,
            code: code.into(),
            state: state.into(),
            client_fingerprint: client_fingerprint.into(),
            client_ip: client_ip.into(),
        };

        let all_present = [
            &request.code,
            &request.state,
            &request.client_fingerprint,
            &request.client_ip,
        ]
        .iter()
        .all(|field| !field.trim().is_empty());

        if all_present {
            Ok(request)
        } else {
            Err(CallbackRejection::MissingParameters)
        }
    }

    /// Validate an inbound redirect
    ///
    /// Parameter presence is checked first, then the provider, which must be
    /// a known interactive provider.
    ///
    /// # Errors
    ///
    /// Returns a [`CallbackRejection`] describing the first failed check.
    pub fn from_redirect(
        provider_param: &str,
        query: &CallbackQuery,
        client: ClientInfo,
    ) -> Result<Self, CallbackRejection> {
        if let Some(provider_error) = &query.error {
            debug!("Provider reported an error on callback: {provider_error}");
        }

        let code = non_empty(query.code.as_deref());
        let state = non_empty(query.state.as_deref());
        let (Some(code), Some(state)) = (code, state) else {
            error!("Callback for '{provider_param}' is missing code or state");
            return Err(CallbackRejection::MissingParameters);
        };

        let provider = Provider::validate(provider_param).map_err(|e| {
            error!("Rejecting callback: {e}");
            CallbackRejection::InvalidProvider(e.0)
        })?;
        let provider = provider
            .interactive()
            .ok_or(CallbackRejection::GuestProvider)?;

        Self::new(provider, code, state, client.fingerprint, client.ip)
    }

    #[must_use]
    pub const fn provider(&self) -> InteractiveProvider {
        self.provider
    }

    #[must_use]
    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    #[must_use]
    pub fn client_fingerprint(&self) -> &str {
        &self.client_fingerprint
    }

    /// JSON body for `POST /oauth/callback`
    #[must_use]
    pub fn exchange_body(&self) -> ExchangeCallbackBody<'_> {
        ExchangeCallbackBody {
            provider_type: self.provider,
            code: &self.code,
            state: &self.state,
            fingerprint: &self.client_fingerprint,
            ip: &self.client_ip,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
