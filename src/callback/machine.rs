//! Lifecycle of one callback exchange attempt
//!
//! An attempt moves `Idle -> Pending -> {Succeeded, Failed, TimedOut}`. The
//! exchange call and a one-second ticker race each other; whichever settles the
//! attempt first wins and everything after is ignored. Success navigates at
//! once, failure and timeout navigate to the login page after a grace delay so
//! the message can be read.
//!
//! Cookies the exchange relays are handed to the browser only as fixed at
//! settle time: everything on success, removals alone otherwise. A result that
//! lands after the attempt settled cannot add to that set.
//!
//! Attempt state lives behind a `parking_lot::Mutex` that is never held across
//! an `.await`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::CallbackRequest;
use crate::cookies::{RelayedCookie, SessionCookies};
use crate::errors::ErrorKind;
use crate::gateway::AuthGateway;
use crate::provider::Provider;
use crate::utils::logging::LoggingHelper;

/// Interval of the elapsed-time counter
pub const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Pending,
    Succeeded,
    Failed { reason: ErrorKind, message: String },
    TimedOut,
}

impl AttemptState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. } | Self::TimedOut)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed { .. } => "failed",
            Self::TimedOut => "timed_out",
        }
    }

    /// Error code for failed and timed-out attempts
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failed { reason, .. } => Some(*reason),
            Self::TimedOut => Some(ErrorKind::Timeout),
            _ => None,
        }
    }
}

/// Where an attempt sends the user once it settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Authenticated,
    Login,
}

/// Side-effect seam for navigation
///
/// Called with the attempt lock held: implementations must not call back into
/// the attempt.
pub trait Navigator: Send + Sync {
    fn navigate(&self, attempt_id: &str, destination: Destination);
}

/// Navigator for deployments where the page polls for its destination
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, attempt_id: &str, destination: Destination) {
        LoggingHelper::log_navigation(attempt_id, destination);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptTiming {
    /// Elapsed seconds at which a pending attempt times out
    pub timeout_seconds: u64,
    /// Delay before navigating to login after a failure or timeout
    pub grace: Duration,
}

impl Default for AttemptTiming {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            grace: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched,
    /// The exchange was already issued; no new call was made
    AlreadyStarted,
    TornDown,
}

/// Point-in-time view of an attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptSnapshot {
    pub id: String,
    pub provider: Provider,
    pub state: AttemptState,
    pub elapsed_seconds: u64,
    pub navigation: Option<Destination>,
    pub torn_down: bool,
}

struct AttemptInner {
    state: AttemptState,
    elapsed_seconds: u64,
    request: Option<CallbackRequest>,
    navigation: Option<Destination>,
    torn_down: bool,
    timers: Vec<JoinHandle<()>>,
    /// Cookies for the browser, fixed when the attempt settles
    handoff: Vec<RelayedCookie>,
}

pub struct CallbackStateMachine {
    id: String,
    provider: Provider,
    started_at: Instant,
    cookies: SessionCookies,
    gateway: Arc<dyn AuthGateway>,
    navigator: Arc<dyn Navigator>,
    timing: AttemptTiming,
    inner: Mutex<AttemptInner>,
    state_tx: watch::Sender<AttemptState>,
}

impl CallbackStateMachine {
    /// Create an idle attempt owning `request`
    #[must_use]
    pub fn new(
        request: CallbackRequest,
        cookies: SessionCookies,
        gateway: Arc<dyn AuthGateway>,
        navigator: Arc<dyn Navigator>,
        timing: AttemptTiming,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(AttemptState::Idle);
        Arc::new(Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider: request.provider().provider(),
            started_at: Instant::now(),
            cookies,
            gateway,
            navigator,
            timing,
            inner: Mutex::new(AttemptInner {
                state: AttemptState::Idle,
                elapsed_seconds: 0,
                request: Some(request),
                navigation: None,
                torn_down: false,
                timers: Vec::new(),
                handoff: Vec::new(),
            }),
            state_tx,
        })
    }

    /// Issue the exchange and start the elapsed-time counter
    ///
    /// The request is taken out of the attempt on the first call, so the
    /// gateway is invoked at most once however often this is called.
    #[must_use = "a second start makes no gateway call"]
    pub fn start(self: &Arc<Self>) -> DispatchOutcome {
        let request = {
            let mut inner = self.inner.lock();
            if inner.torn_down {
                return DispatchOutcome::TornDown;
            }
            if inner.state != AttemptState::Idle {
                return DispatchOutcome::AlreadyStarted;
            }
            let Some(request) = inner.request.take() else {
                return DispatchOutcome::AlreadyStarted;
            };
            self.transition(&mut inner, AttemptState::Pending);
            request
        };

        LoggingHelper::log_attempt_started(&self.id, self.provider);

        // The exchange is never cancelled; a result arriving after teardown
        // or timeout is dropped in `finish_exchange`.
        tokio::spawn(Arc::clone(self).run_exchange(request));
        let ticker = tokio::spawn(Arc::clone(self).run_ticker());

        let mut inner = self.inner.lock();
        if inner.torn_down {
            ticker.abort();
        } else {
            inner.timers.push(ticker);
        }
        DispatchOutcome::Dispatched
    }

    async fn run_exchange(self: Arc<Self>, request: CallbackRequest) {
        let result = self.gateway.exchange_callback(request, &self.cookies).await;
        let next = match result {
            Ok(()) => AttemptState::Succeeded,
            Err(e) => AttemptState::Failed {
                reason: e.kind(),
                message: e.readable().to_string(),
            },
        };
        self.finish_exchange(next);
    }

    fn finish_exchange(self: &Arc<Self>, next: AttemptState) {
        let mut inner = self.inner.lock();
        if inner.torn_down || inner.state.is_terminal() {
            LoggingHelper::log_late_event(&self.id, "exchange result", &inner.state);
            return;
        }
        self.settle(&mut inner, next);
    }

    async fn run_ticker(self: Arc<Self>) {
        let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !self.on_tick() {
                break;
            }
        }
    }

    /// Count one second; returns whether the ticker should keep running
    fn on_tick(self: &Arc<Self>) -> bool {
        let mut inner = self.inner.lock();
        if inner.torn_down || inner.state.is_terminal() {
            return false;
        }
        inner.elapsed_seconds += 1;
        if inner.elapsed_seconds >= self.timing.timeout_seconds {
            self.settle(&mut inner, AttemptState::TimedOut);
            return false;
        }
        true
    }

    fn settle(self: &Arc<Self>, inner: &mut AttemptInner, next: AttemptState) {
        self.transition(inner, next);
        inner.handoff = self.cookies.pending_set_cookies();
        if inner.state != AttemptState::Succeeded {
            inner.handoff.retain(RelayedCookie::is_removal);
        }
        LoggingHelper::log_attempt_outcome(&self.id, &inner.state, inner.elapsed_seconds);

        if inner.state == AttemptState::Succeeded {
            self.navigate(inner, Destination::Authenticated);
            return;
        }

        let this = Arc::clone(self);
        let grace = self.timing.grace;
        inner.timers.push(tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            this.navigate_after_grace();
        }));
    }

    fn navigate_after_grace(&self) {
        let mut inner = self.inner.lock();
        if inner.torn_down || inner.navigation.is_some() {
            return;
        }
        self.navigate(&mut inner, Destination::Login);
    }

    fn navigate(&self, inner: &mut AttemptInner, destination: Destination) {
        inner.navigation = Some(destination);
        self.navigator.navigate(&self.id, destination);
    }

    fn transition(&self, inner: &mut AttemptInner, next: AttemptState) {
        inner.state = next.clone();
        self.state_tx.send_replace(next);
    }

    /// Cancel every pending timer
    ///
    /// No state change or navigation happens after this returns. Idempotent.
    pub fn teardown(&self) {
        let mut inner = self.inner.lock();
        if inner.torn_down {
            return;
        }
        inner.torn_down = true;
        inner.request = None;
        for timer in inner.timers.drain(..) {
            timer.abort();
        }
        LoggingHelper::log_attempt_torn_down(&self.id);
    }

    #[must_use]
    pub fn snapshot(&self) -> AttemptSnapshot {
        let inner = self.inner.lock();
        AttemptSnapshot {
            id: self.id.clone(),
            provider: self.provider,
            state: inner.state.clone(),
            elapsed_seconds: inner.elapsed_seconds,
            navigation: inner.navigation,
            torn_down: inner.torn_down,
        }
    }

    /// Receiver of state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AttemptState> {
        self.state_tx.subscribe()
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    /// Cookie store the exchange relays into
    #[must_use]
    pub const fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    /// Cookies to hand to the browser; empty until the attempt settles
    #[must_use]
    pub fn settled_cookies(&self) -> Vec<RelayedCookie> {
        self.inner.lock().handoff.clone()
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Drop for CallbackStateMachine {
    fn drop(&mut self) {
        for timer in self.inner.get_mut().timers.drain(..) {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::AuthError;
    use crate::testing::{MockAuthGateway, RecordingNavigator, ScriptedCall, TestFixtures};

    struct Harness {
        machine: Arc<CallbackStateMachine>,
        gateway: Arc<MockAuthGateway>,
        navigator: Arc<RecordingNavigator>,
    }

    fn harness(exchange: ScriptedCall) -> Harness {
        let gateway = Arc::new(MockAuthGateway::new().with_exchange(exchange));
        let navigator = Arc::new(RecordingNavigator::default());
        let machine = CallbackStateMachine::new(
            TestFixtures::callback_request(Provider::Google),
            SessionCookies::new(),
            gateway.clone(),
            navigator.clone(),
            AttemptTiming::default(),
        );
        Harness {
            machine,
            gateway,
            navigator,
        }
    }

    async fn run_for(duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_navigates_immediately() {
        let h = harness(ScriptedCall::succeed().with_set_cookie("oauth_session=s3ss; HttpOnly"));

        assert_eq!(h.machine.start(), DispatchOutcome::Dispatched);
        run_for(Duration::from_millis(1)).await;

        let snapshot = h.machine.snapshot();
        assert_eq!(snapshot.state, AttemptState::Succeeded);
        assert_eq!(snapshot.elapsed_seconds, 0);
        assert_eq!(snapshot.navigation, Some(Destination::Authenticated));
        assert_eq!(
            h.navigator.destinations_for(h.machine.id()),
            vec![Destination::Authenticated]
        );
        assert_eq!(h.machine.cookies().get("oauth_session").as_deref(), Some("s3ss"));
        let settled = h.machine.settled_cookies();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].name, "oauth_session");

        // Counter stops at the terminal state
        run_for(Duration::from_secs(5)).await;
        assert_eq!(h.machine.snapshot().elapsed_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_navigates_after_grace() {
        let h = harness(ScriptedCall::fail(TestFixtures::http_error(401, "Session expired")));

        let _ = h.machine.start();
        run_for(Duration::from_millis(1)).await;

        assert_eq!(
            h.machine.snapshot().state,
            AttemptState::Failed {
                reason: ErrorKind::HttpError,
                message: "Session expired".to_string(),
            }
        );
        assert!(h.navigator.destinations_for(h.machine.id()).is_empty());

        run_for(Duration::from_millis(1_500)).await;
        assert!(h.navigator.destinations_for(h.machine.id()).is_empty());

        run_for(Duration::from_secs(1)).await;
        assert_eq!(
            h.navigator.destinations_for(h.machine.id()),
            vec![Destination::Login]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_message() {
        let h = harness(ScriptedCall::fail(AuthError::Network("refused".to_string())));

        let _ = h.machine.start();
        run_for(Duration::from_millis(1)).await;

        let state = h.machine.snapshot().state;
        assert_eq!(state.error_kind(), Some(ErrorKind::Network));
        assert!(matches!(
            state,
            AttemptState::Failed { message, .. } if message == crate::gateway::NETWORK_READABLE
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_at_budget() {
        let h = harness(ScriptedCall::succeed().with_delay(Duration::from_secs(90)));

        let _ = h.machine.start();
        run_for(Duration::from_millis(59_500)).await;
        let snapshot = h.machine.snapshot();
        assert_eq!(snapshot.state, AttemptState::Pending);
        assert_eq!(snapshot.elapsed_seconds, 59);

        run_for(Duration::from_secs(1)).await;
        let snapshot = h.machine.snapshot();
        assert_eq!(snapshot.state, AttemptState::TimedOut);
        assert_eq!(snapshot.elapsed_seconds, 60);
        assert!(snapshot.navigation.is_none());

        run_for(Duration::from_secs(2)).await;
        assert_eq!(h.machine.snapshot().navigation, Some(Destination::Login));

        // The late success is ignored
        run_for(Duration::from_secs(30)).await;
        assert_eq!(h.machine.snapshot().state, AttemptState::TimedOut);
        assert_eq!(
            h.navigator.destinations_for(h.machine.id()),
            vec![Destination::Login]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_dispatches_once() {
        let h = harness(ScriptedCall::hang());

        assert_eq!(h.machine.start(), DispatchOutcome::Dispatched);
        assert_eq!(h.machine.start(), DispatchOutcome::AlreadyStarted);
        run_for(Duration::from_millis(1)).await;
        assert_eq!(h.machine.start(), DispatchOutcome::AlreadyStarted);

        assert_eq!(h.gateway.exchange_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_stops_everything() {
        let h = harness(ScriptedCall::hang());

        let _ = h.machine.start();
        run_for(Duration::from_millis(10_500)).await;
        h.machine.teardown();

        run_for(Duration::from_secs(120)).await;
        let snapshot = h.machine.snapshot();
        assert_eq!(snapshot.state, AttemptState::Pending);
        assert_eq!(snapshot.elapsed_seconds, 10);
        assert!(snapshot.torn_down);
        assert!(h.navigator.destinations_for(h.machine.id()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_during_grace_cancels_navigation() {
        let h = harness(ScriptedCall::fail(TestFixtures::http_error(500, "Internal Server Error")));

        let _ = h.machine.start();
        run_for(Duration::from_secs(1)).await;
        h.machine.teardown();
        run_for(Duration::from_secs(5)).await;

        assert!(h.navigator.destinations_for(h.machine.id()).is_empty());
        assert!(h.machine.snapshot().state.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_exchange_after_teardown_is_ignored() {
        let h = harness(ScriptedCall::succeed().with_delay(Duration::from_secs(3)));

        let _ = h.machine.start();
        run_for(Duration::from_secs(1)).await;
        h.machine.teardown();
        run_for(Duration::from_secs(5)).await;

        assert_eq!(h.machine.snapshot().state, AttemptState::Pending);
        assert!(h.navigator.destinations_for(h.machine.id()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_teardown() {
        let h = harness(ScriptedCall::succeed());

        h.machine.teardown();
        assert_eq!(h.machine.start(), DispatchOutcome::TornDown);
        run_for(Duration::from_millis(1)).await;
        assert_eq!(h.gateway.exchange_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_observe_transitions() {
        let h = harness(ScriptedCall::succeed().with_delay(Duration::from_secs(2)));
        let mut rx = h.machine.subscribe();
        assert_eq!(*rx.borrow(), AttemptState::Idle);

        let _ = h.machine.start();
        assert_eq!(*rx.borrow_and_update(), AttemptState::Pending);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), AttemptState::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_success_after_timeout_hands_off_nothing() {
        let h = harness(
            ScriptedCall::succeed()
                .with_delay(Duration::from_millis(60_500))
                .with_set_cookie("oauth_session=late; Path=/; HttpOnly"),
        );

        let _ = h.machine.start();
        run_for(Duration::from_secs(60)).await;
        assert_eq!(h.machine.snapshot().state, AttemptState::TimedOut);
        assert!(h.machine.settled_cookies().is_empty());

        // The backend answers while the grace delay is still running
        run_for(Duration::from_secs(1)).await;
        assert_eq!(h.gateway.exchange_calls(), 1);
        assert_eq!(h.machine.cookies().get("oauth_session").as_deref(), Some("late"));
        assert_eq!(h.machine.snapshot().state, AttemptState::TimedOut);
        assert!(h.machine.settled_cookies().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_hands_off_removals_only() {
        let h = harness(
            ScriptedCall::fail(AuthError::Network("body read failed".to_string()))
                .with_set_cookie("oauth_session=s3ss; Path=/; HttpOnly")
                .with_set_cookie("oauth_state=; Path=/; Max-Age=0"),
        );

        let _ = h.machine.start();
        run_for(Duration::from_millis(1)).await;

        assert!(h.machine.snapshot().state.is_terminal());
        let settled = h.machine.settled_cookies();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].name, "oauth_state");
        assert!(settled[0].is_removal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_handed_off_while_pending() {
        let h = harness(
            ScriptedCall::relay_then_hang().with_set_cookie("oauth_session=s3ss; Path=/"),
        );

        let _ = h.machine.start();
        run_for(Duration::from_secs(5)).await;

        assert_eq!(h.machine.snapshot().state, AttemptState::Pending);
        assert!(h.machine.cookies().contains("oauth_session"));
        assert!(h.machine.settled_cookies().is_empty());
    }
}
