use actix_web::{HttpResponse, Result};
use serde_json::json;

use super::callback::attempt_status_url;
use crate::models::HealthResponse;
use crate::provider::Provider;

const CALLBACK_PAGE_TEMPLATE: &str = include_str!("../static/callback.html");

/// Health check endpoint
///
/// # Errors
/// Returns an error if health status cannot be determined
pub async fn health() -> Result<HttpResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        message: "authbridge is running".to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Progress page served on the callback redirect
///
/// The page polls `status_url` once a second and follows `redirectTo` when
/// the attempt settles.
#[must_use]
pub fn render_callback_page(
    provider: Provider,
    attempt_id: &str,
    status_url: &str,
    login_path: &str,
    timeout_seconds: u64,
) -> String {
    let config = json!({
        "attemptId": attempt_id,
        "statusUrl": status_url,
        "teardownUrl": format!("{}/teardown", attempt_status_url(attempt_id)),
        "loginUrl": login_path,
        "timeoutSeconds": timeout_seconds,
    })
    .to_string()
    .replace('<', "\\u003c");

    CALLBACK_PAGE_TEMPLATE
        .replace("{{PROVIDER_NAME}}", provider.display_name())
        .replace("{{ATTEMPT_CONFIG}}", &config)
}
