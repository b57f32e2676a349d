// Centralized logging for gateway calls and callback attempts
use log::{debug, error, info, warn};
use url::Url;

use crate::callback::{AttemptState, Destination};
use crate::cookies::RelaySummary;
use crate::gateway::AuthError;
use crate::models::BackendErrorBody;
use crate::provider::Provider;

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log an outgoing backend call
    pub fn log_gateway_call(operation: &str, url: &Url) {
        debug!("🔄 Backend call {} -> {}", operation, url);
    }

    /// Log the cookies relayed from a backend response
    pub fn log_relay_summary(operation: &str, summary: &RelaySummary) {
        if !summary.applied.is_empty() {
            debug!("🍪 {} relayed cookies: {:?}", operation, summary.applied);
        }
        if summary.skipped > 0 {
            warn!(
                "🍪 {} skipped {} malformed Set-Cookie value(s)",
                operation, summary.skipped
            );
        }
    }

    /// Log a classified gateway failure
    pub fn log_gateway_failure(operation: &str, err: &AuthError) {
        error!("❌ Backend call {} failed ({}): {}", operation, err.kind(), err);
    }

    /// Log the structured error body returned by the backend
    pub fn log_backend_error(body: &BackendErrorBody) {
        warn!(
            "Backend error {}: {} (readable: {:?})",
            body.error_code, body.message, body.readable
        );
        if let Some(details) = &body.details {
            debug!("Backend error details: {}", details);
        }
    }

    /// Log the start of a callback exchange
    pub fn log_attempt_started(attempt_id: &str, provider: Provider) {
        info!("🔐 Callback attempt {} started for {}", attempt_id, provider);
    }

    /// Log a terminal transition
    pub fn log_attempt_outcome(attempt_id: &str, state: &AttemptState, elapsed_seconds: u64) {
        match state {
            AttemptState::Succeeded => {
                info!("✅ Callback attempt {} succeeded after {}s", attempt_id, elapsed_seconds);
            }
            AttemptState::Failed { reason, message } => {
                warn!(
                    "❌ Callback attempt {} failed after {}s ({}): {}",
                    attempt_id, elapsed_seconds, reason, message
                );
            }
            AttemptState::TimedOut => {
                warn!("⏱️  Callback attempt {} timed out after {}s", attempt_id, elapsed_seconds);
            }
            AttemptState::Idle | AttemptState::Pending => {
                debug!("Callback attempt {} is {}", attempt_id, state.as_str());
            }
        }
    }

    /// Log an event that arrived after the attempt settled
    pub fn log_late_event(attempt_id: &str, event: &str, state: &AttemptState) {
        debug!(
            "Ignoring {} for callback attempt {} (already {})",
            event,
            attempt_id,
            state.as_str()
        );
    }

    pub fn log_navigation(attempt_id: &str, destination: Destination) {
        info!("➡️  Callback attempt {} navigating to {:?}", attempt_id, destination);
    }

    pub fn log_attempt_torn_down(attempt_id: &str) {
        debug!("Callback attempt {} torn down", attempt_id);
    }

    /// Log a callback redirect turned away before any backend call
    pub fn log_callback_rejected(provider_param: &str, reason: &str) {
        warn!("🚫 Rejected callback for '{}': {}", provider_param, reason);
    }

    /// Log callback request details in development mode
    pub fn log_callback_debug(req: &actix_web::HttpRequest) {
        debug!("OAuth callback received via {} {}", req.method(), req.path());
        debug!("Callback request connection info: {:?}", req.connection_info());
    }
}
