//! Running callback attempts, keyed by attempt id
//!
//! The callback page creates an attempt on load and tears it down when the
//! page goes away. Attempts the page never tears down are reaped once they
//! outlive the retention window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::machine::{AttemptTiming, CallbackStateMachine, DispatchOutcome, Navigator};
use super::CallbackRequest;
use crate::cookies::SessionCookies;
use crate::gateway::AuthGateway;

pub struct AttemptRegistry {
    gateway: Arc<dyn AuthGateway>,
    navigator: Arc<dyn Navigator>,
    timing: AttemptTiming,
    attempts: Mutex<HashMap<String, Arc<CallbackStateMachine>>>,
}

impl AttemptRegistry {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn AuthGateway>,
        navigator: Arc<dyn Navigator>,
        timing: AttemptTiming,
    ) -> Self {
        Self {
            gateway,
            navigator,
            timing,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Create an attempt for `request` and dispatch its exchange
    pub fn begin(
        &self,
        request: CallbackRequest,
        cookies: SessionCookies,
    ) -> Arc<CallbackStateMachine> {
        let attempt = CallbackStateMachine::new(
            request,
            cookies,
            Arc::clone(&self.gateway),
            Arc::clone(&self.navigator),
            self.timing,
        );
        self.attempts
            .lock()
            .insert(attempt.id().to_string(), Arc::clone(&attempt));

        let outcome = attempt.start();
        debug!("Callback attempt {} dispatch: {:?}", attempt.id(), outcome);
        debug_assert_eq!(outcome, DispatchOutcome::Dispatched);
        attempt
    }

    #[must_use]
    pub fn get(&self, attempt_id: &str) -> Option<Arc<CallbackStateMachine>> {
        self.attempts.lock().get(attempt_id).cloned()
    }

    /// Tear down and forget an attempt; returns whether it existed
    pub fn teardown(&self, attempt_id: &str) -> bool {
        let removed = self.attempts.lock().remove(attempt_id);
        removed.is_some_and(|attempt| {
            attempt.teardown();
            true
        })
    }

    /// Tear down attempts older than `max_age`; returns how many were removed
    pub fn reap_expired(&self, max_age: Duration) -> usize {
        let expired: Vec<Arc<CallbackStateMachine>> = {
            let mut attempts = self.attempts.lock();
            let ids: Vec<String> = attempts
                .iter()
                .filter(|(_, attempt)| attempt.age() >= max_age)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| attempts.remove(id)).collect()
        };

        for attempt in &expired {
            attempt.teardown();
        }
        expired.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attempts.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.lock().is_empty()
    }
}

/// Periodically reap attempts older than `retention`
pub fn spawn_reaper(
    registry: Arc<AttemptRegistry>,
    retention: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let reaped = registry.reap_expired(retention);
            if reaped > 0 {
                info!("🧹 Reaped {reaped} stale callback attempt(s)");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{AttemptState, Destination};
    use crate::provider::Provider;
    use crate::testing::{MockAuthGateway, RecordingNavigator, ScriptedCall, TestFixtures};

    fn registry(exchange: ScriptedCall) -> (AttemptRegistry, Arc<MockAuthGateway>, Arc<RecordingNavigator>) {
        let gateway = Arc::new(MockAuthGateway::new().with_exchange(exchange));
        let navigator = Arc::new(RecordingNavigator::default());
        let registry = AttemptRegistry::new(
            gateway.clone(),
            navigator.clone(),
            AttemptTiming::default(),
        );
        (registry, gateway, navigator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_dispatches_and_registers() {
        let (registry, gateway, navigator) = registry(ScriptedCall::succeed());

        let attempt = registry.begin(
            TestFixtures::callback_request(Provider::Github),
            SessionCookies::new(),
        );
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(registry.len(), 1);
        assert_eq!(gateway.exchange_calls(), 1);
        let found = registry.get(attempt.id()).unwrap();
        assert_eq!(found.snapshot().state, AttemptState::Succeeded);
        assert_eq!(
            navigator.destinations_for(attempt.id()),
            vec![Destination::Authenticated]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_removes_attempt() {
        let (registry, _gateway, navigator) = registry(ScriptedCall::hang());

        let attempt = registry.begin(
            TestFixtures::callback_request(Provider::Discord),
            SessionCookies::new(),
        );
        assert!(registry.teardown(attempt.id()));
        assert!(!registry.teardown(attempt.id()));
        assert!(registry.get(attempt.id()).is_none());
        assert!(registry.is_empty());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(attempt.snapshot().torn_down);
        assert!(navigator.navigations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_expired() {
        let (registry, _gateway, _navigator) = registry(ScriptedCall::hang());

        let old = registry.begin(
            TestFixtures::callback_request(Provider::Google),
            SessionCookies::new(),
        );
        tokio::time::sleep(Duration::from_secs(200)).await;
        let fresh = registry.begin(
            TestFixtures::callback_request(Provider::Google),
            SessionCookies::new(),
        );
        tokio::time::sleep(Duration::from_secs(150)).await;

        assert_eq!(registry.reap_expired(Duration::from_secs(300)), 1);
        assert!(registry.get(old.id()).is_none());
        assert!(registry.get(fresh.id()).is_some());
        assert!(old.snapshot().torn_down);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_task() {
        let (registry, _gateway, _navigator) = registry(ScriptedCall::hang());
        let registry = Arc::new(registry);

        let _ = registry.begin(
            TestFixtures::callback_request(Provider::Google),
            SessionCookies::new(),
        );
        let reaper = spawn_reaper(
            Arc::clone(&registry),
            Duration::from_secs(300),
            Duration::from_secs(30),
        );

        tokio::time::sleep(Duration::from_secs(280)).await;
        assert_eq!(registry.len(), 1);
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(registry.is_empty());
        reaper.abort();
    }
}
