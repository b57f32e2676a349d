//! Test fixtures providing pre-built test objects

use actix_web::test::TestRequest;

use super::constants::{TEST_CLIENT_IP, TEST_CODE, TEST_STATE, TEST_USER_AGENT};
use crate::callback::CallbackRequest;
use crate::gateway::AuthError;
use crate::provider::Provider;
use crate::settings::BridgeSettings;

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// A valid callback request for an interactive provider
    ///
    /// # Panics
    ///
    /// Panics if `provider` is the guest provider.
    #[must_use]
    pub fn callback_request(provider: Provider) -> CallbackRequest {
        let provider = provider
            .interactive()
            .expect("callback fixtures need an interactive provider");
        CallbackRequest::new(provider, TEST_CODE, TEST_STATE, TEST_USER_AGENT, TEST_CLIENT_IP)
            .expect("fixture fields are non-empty")
    }

    /// An HTTP error as the backend would report it
    #[must_use]
    pub fn http_error(status: u16, readable: &str) -> AuthError {
        AuthError::Http {
            status,
            error_code: i64::from(status),
            message: format!("backend rejected request with {status}"),
            readable: readable.to_string(),
        }
    }

    /// Settings pointing at `api_url` with the default timing
    #[must_use]
    pub fn settings(api_url: &str) -> BridgeSettings {
        let mut settings = BridgeSettings::default();
        settings.backend.api_url = api_url.to_string();
        settings.backend.request_timeout_seconds = 5;
        settings
    }

    /// A browser-like request as sent by the provider redirect
    #[must_use]
    pub fn browser_request(uri: &str) -> TestRequest {
        TestRequest::get()
            .uri(uri)
            .insert_header(("accept", "text/html,application/xhtml+xml"))
            .insert_header(("user-agent", TEST_USER_AGENT))
            .insert_header(("x-forwarded-for", TEST_CLIENT_IP))
    }

    /// A JSON API client request
    #[must_use]
    pub fn api_request(uri: &str) -> TestRequest {
        TestRequest::get()
            .uri(uri)
            .insert_header(("accept", "application/json"))
            .insert_header(("user-agent", "authbridge-tests/1.0"))
            .insert_header(("x-forwarded-for", TEST_CLIENT_IP))
    }
}
