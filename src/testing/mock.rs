//! Mock objects and fake implementations for testing
//!
//! [`MockAuthGateway`] plays back a [`ScriptedCall`] per operation. Like the
//! real gateway it relays the scripted `Set-Cookie` values into the store
//! before reporting the outcome.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use url::Url;

use super::constants::TEST_CODE_URL;
use crate::callback::{CallbackRequest, Destination, Navigator};
use crate::cookies::{relay, SessionCookies};
use crate::gateway::{AuthError, AuthGateway};
use crate::provider::{InteractiveProvider, Provider};

/// Scripted behaviour of one gateway operation
#[derive(Debug, Clone)]
pub struct ScriptedCall {
    delay: Option<Duration>,
    hang: bool,
    set_cookies: Vec<String>,
    after_relay: AfterRelay,
    result: Result<(), AuthError>,
}

/// What a call does between relaying its cookies and reporting the outcome
#[derive(Debug, Clone)]
enum AfterRelay {
    Report,
    Hang,
    WaitFor(Arc<Notify>),
}

impl ScriptedCall {
    fn scripted(hang: bool, result: Result<(), AuthError>) -> Self {
        Self {
            delay: None,
            hang,
            set_cookies: Vec::new(),
            after_relay: AfterRelay::Report,
            result,
        }
    }

    #[must_use]
    pub fn succeed() -> Self {
        Self::scripted(false, Ok(()))
    }

    #[must_use]
    pub fn fail(error: AuthError) -> Self {
        Self::scripted(false, Err(error))
    }

    /// Never completes and never relays
    #[must_use]
    pub fn hang() -> Self {
        Self::scripted(true, Ok(()))
    }

    /// Relays its cookies, then never completes
    #[must_use]
    pub fn relay_then_hang() -> Self {
        Self {
            after_relay: AfterRelay::Hang,
            ..Self::succeed()
        }
    }

    /// Relays its cookies, then succeeds once `release` is notified
    #[must_use]
    pub fn relay_then_wait(release: Arc<Notify>) -> Self {
        Self {
            after_relay: AfterRelay::WaitFor(release),
            ..Self::succeed()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Relay this raw `Set-Cookie` value when the call completes
    #[must_use]
    pub fn with_set_cookie(mut self, raw: impl Into<String>) -> Self {
        self.set_cookies.push(raw.into());
        self
    }

    async fn play(&self, cookies: &SessionCookies) -> Result<(), AuthError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        relay(cookies, &self.set_cookies);
        match &self.after_relay {
            AfterRelay::Report => {}
            AfterRelay::Hang => std::future::pending::<()>().await,
            AfterRelay::WaitFor(release) => release.notified().await,
        }
        self.result.clone()
    }
}

/// What the mock saw on an exchange call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRecord {
    pub provider: Provider,
    pub client_ip: String,
    pub client_fingerprint: String,
    pub cookie_header: Option<String>,
}

/// Scripted [`AuthGateway`] that counts its calls
#[derive(Debug)]
pub struct MockAuthGateway {
    authorization: ScriptedCall,
    code_url: Url,
    exchange: ScriptedCall,
    guest: ScriptedCall,
    authorization_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
    guest_calls: AtomicUsize,
    exchanges: Mutex<Vec<ExchangeRecord>>,
}

impl Default for MockAuthGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthGateway {
    /// A gateway where every operation succeeds immediately
    ///
    /// # Panics
    ///
    /// Panics if the built-in code URL fails to parse.
    #[must_use]
    pub fn new() -> Self {
        Self {
            authorization: ScriptedCall::succeed(),
            code_url: Url::parse(TEST_CODE_URL).unwrap(),
            exchange: ScriptedCall::succeed(),
            guest: ScriptedCall::succeed(),
            authorization_calls: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
            guest_calls: AtomicUsize::new(0),
            exchanges: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_authorization(mut self, call: ScriptedCall) -> Self {
        self.authorization = call;
        self
    }

    #[must_use]
    pub fn with_code_url(mut self, code_url: Url) -> Self {
        self.code_url = code_url;
        self
    }

    #[must_use]
    pub fn with_exchange(mut self, call: ScriptedCall) -> Self {
        self.exchange = call;
        self
    }

    #[must_use]
    pub fn with_guest(mut self, call: ScriptedCall) -> Self {
        self.guest = call;
        self
    }

    pub fn authorization_calls(&self) -> usize {
        self.authorization_calls.load(Ordering::SeqCst)
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn guest_calls(&self) -> usize {
        self.guest_calls.load(Ordering::SeqCst)
    }

    pub fn exchanges(&self) -> Vec<ExchangeRecord> {
        self.exchanges.lock().clone()
    }
}

#[async_trait]
impl AuthGateway for MockAuthGateway {
    async fn request_authorization_url(
        &self,
        _provider: InteractiveProvider,
        cookies: &SessionCookies,
    ) -> Result<Url, AuthError> {
        self.authorization_calls.fetch_add(1, Ordering::SeqCst);
        self.authorization.play(cookies).await?;
        Ok(self.code_url.clone())
    }

    async fn exchange_callback(
        &self,
        request: CallbackRequest,
        cookies: &SessionCookies,
    ) -> Result<(), AuthError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchanges.lock().push(ExchangeRecord {
            provider: request.provider().provider(),
            client_ip: request.client_ip().to_string(),
            client_fingerprint: request.client_fingerprint().to_string(),
            cookie_header: cookies.cookie_header(),
        });
        self.exchange.play(cookies).await
    }

    async fn create_guest_session(&self, cookies: &SessionCookies) -> Result<(), AuthError> {
        self.guest_calls.fetch_add(1, Ordering::SeqCst);
        self.guest.play(cookies).await
    }
}

/// Navigator that records every navigation
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    navigations: Mutex<Vec<(String, Destination)>>,
}

impl RecordingNavigator {
    pub fn navigations(&self) -> Vec<(String, Destination)> {
        self.navigations.lock().clone()
    }

    pub fn destinations_for(&self, attempt_id: &str) -> Vec<Destination> {
        self.navigations
            .lock()
            .iter()
            .filter(|(id, _)| id == attempt_id)
            .map(|(_, destination)| *destination)
            .collect()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, attempt_id: &str, destination: Destination) {
        self.navigations
            .lock()
            .push((attempt_id.to_string(), destination));
    }
}
