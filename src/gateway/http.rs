//! `reqwest` implementation of [`AuthGateway`]

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, ACCEPT, COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use serde::Serialize;
use url::Url;

use super::{AuthError, AuthGateway, INTERNAL_READABLE};
use crate::callback::CallbackRequest;
use crate::cookies::{relay, RelaySummary, SessionCookies};
use crate::models::{BackendErrorBody, CodeUrlResponse, GenerateCodeUrlBody};
use crate::provider::InteractiveProvider;
use crate::settings::BackendSettings;
use crate::utils::logging::LoggingHelper;

const GENERATE_CODE_URL_PATH: &str = "oauth/generate-code-url";
const CALLBACK_PATH: &str = "oauth/callback";
const GUEST_PATH: &str = "user/create/guest";

/// Status and body of a backend response whose cookies were already relayed
struct BackendResponse {
    status: StatusCode,
    body: Vec<u8>,
}

/// Gateway talking JSON over HTTP to the backend API
#[derive(Debug, Clone)]
pub struct HttpAuthGateway {
    client: reqwest::Client,
    generate_code_url: Url,
    callback_url: Url,
    guest_url: Url,
}

impl HttpAuthGateway {
    /// Create a gateway for the API rooted at `api_url`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `api_url` is not an absolute http(s) URL
    /// - The HTTP client cannot be built
    pub fn new(api_url: &str, request_timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(api_url).with_context(|| format!("Invalid API URL: {api_url}"))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("API URL must use http or https: {api_url}");
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            generate_code_url: base.join(GENERATE_CODE_URL_PATH)?,
            callback_url: base.join(CALLBACK_PATH)?,
            guest_url: base.join(GUEST_PATH)?,
        })
    }

    /// Create a gateway from backend settings
    ///
    /// # Errors
    ///
    /// Returns an error if the configured API URL is invalid.
    pub fn from_settings(settings: &BackendSettings) -> Result<Self> {
        Self::new(
            &settings.api_url,
            Duration::from_secs(settings.request_timeout_seconds),
        )
    }

    /// POST to the backend with the store's cookies attached
    ///
    /// This is the only way requests leave the gateway, so every call carries
    /// credentials and every response's cookies land in the store before the
    /// status is looked at.
    async fn send<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        url: &Url,
        body: Option<&B>,
        cookies: &SessionCookies,
    ) -> Result<BackendResponse, AuthError> {
        LoggingHelper::log_gateway_call(operation, url);

        let mut request = self
            .client
            .post(url.clone())
            .header(ACCEPT, "application/json");
        if let Some(cookie_header) = cookies.cookie_header() {
            request = request.header(COOKIE, cookie_header);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        let summary = relay_response_cookies(cookies, response.headers());
        LoggingHelper::log_relay_summary(operation, &summary);

        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::Network(format!("Failed to read response body: {e}")))?;

        debug!("{operation} answered {status} with {} body bytes", body.len());
        Ok(BackendResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Relay every `Set-Cookie` header of a backend response
///
/// Values that are not visible ASCII are skipped and counted like any other
/// malformed definition.
fn relay_response_cookies(cookies: &SessionCookies, headers: &HeaderMap) -> RelaySummary {
    let mut unreadable = 0;
    let values: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| match value.to_str() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Skipping unreadable Set-Cookie value: {e}");
                unreadable += 1;
                None
            }
        })
        .collect();

    let mut summary = relay(cookies, values);
    summary.skipped += unreadable;
    summary
}

/// Turn a non-success response into an [`AuthError::Http`]
fn ensure_success(operation: &str, response: BackendResponse) -> Result<BackendResponse, AuthError> {
    if response.status.is_success() {
        Ok(response)
    } else {
        let error = classify_error_body(response.status.as_u16(), &response.body);
        LoggingHelper::log_gateway_failure(operation, &error);
        Err(error)
    }
}

/// Classify an error response body
///
/// Bodies that do not match the backend's error shape still produce an HTTP
/// error, with a generic readable message.
#[must_use]
pub fn classify_error_body(status: u16, body: &[u8]) -> AuthError {
    match serde_json::from_slice::<BackendErrorBody>(body) {
        Ok(parsed) => {
            LoggingHelper::log_backend_error(&parsed);
            AuthError::Http {
                status,
                error_code: parsed.error_code,
                message: parsed.message,
                readable: parsed.readable,
            }
        }
        Err(e) => {
            warn!("Failed to parse error response (status {status}): {e}");
            AuthError::Http {
                status,
                error_code: 500,
                message: "Failed to parse error response".to_string(),
                readable: INTERNAL_READABLE.to_string(),
            }
        }
    }
}

/// Validate the body of a successful authorization-URL response
///
/// # Errors
///
/// Returns [`AuthError::MalformedResponse`] unless the body is `{codeURL}`
/// holding an absolute http(s) URL.
pub fn parse_code_url(body: &[u8]) -> Result<Url, AuthError> {
    let parsed: CodeUrlResponse = serde_json::from_slice(body)
        .map_err(|e| AuthError::MalformedResponse(format!("Invalid code URL response: {e}")))?;
    let url = Url::parse(&parsed.code_url)
        .map_err(|e| AuthError::MalformedResponse(format!("Invalid codeURL: {e}")))?;
    if matches!(url.scheme(), "http" | "https") {
        Ok(url)
    } else {
        Err(AuthError::MalformedResponse(format!(
            "codeURL has unsupported scheme: {}",
            url.scheme()
        )))
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn request_authorization_url(
        &self,
        provider: InteractiveProvider,
        cookies: &SessionCookies,
    ) -> Result<Url, AuthError> {
        const OPERATION: &str = "generate-code-url";
        let body = GenerateCodeUrlBody {
            provider_type: provider,
        };
        let response = self
            .send(OPERATION, &self.generate_code_url, Some(&body), cookies)
            .await?;
        let response = ensure_success(OPERATION, response)?;

        parse_code_url(&response.body).inspect_err(|e| LoggingHelper::log_gateway_failure(OPERATION, e))
    }

    async fn exchange_callback(
        &self,
        request: CallbackRequest,
        cookies: &SessionCookies,
    ) -> Result<(), AuthError> {
        const OPERATION: &str = "oauth-callback";
        let body = request.exchange_body();
        let response = self
            .send(OPERATION, &self.callback_url, Some(&body), cookies)
            .await?;
        ensure_success(OPERATION, response).map(|_| ())
    }

    async fn create_guest_session(&self, cookies: &SessionCookies) -> Result<(), AuthError> {
        const OPERATION: &str = "create-guest";
        let response = self
            .send::<()>(OPERATION, &self.guest_url, None, cookies)
            .await?;
        ensure_success(OPERATION, response).map(|_| ())
    }
}
