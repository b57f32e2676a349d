// OAuth callback and attempt lifecycle handlers
use actix_web::{web, HttpRequest, HttpResponse, Result};

use super::static_files::render_callback_page;
use crate::callback::{
    AttemptRegistry, AttemptSnapshot, AttemptState, CallbackQuery, CallbackRequest, Destination,
};
use crate::cookies::SessionCookies;
use crate::models::{AttemptCreatedResponse, AttemptView};
use crate::settings::{BridgeSettings, RouteSettings};
use crate::utils::headers::{extract_client_info, is_browser_request};
use crate::utils::logging::LoggingHelper;
use crate::utils::responses::ResponseBuilder;

/// Message shown when the exchange does not finish in time
pub const TIMEOUT_MESSAGE: &str = "Authentication timed out. Please try again.";

/// Provider redirect target
///
/// The redirect is validated before anything touches the network; a bad one
/// bounces to the login page. A good one starts an exchange attempt and gets
/// the progress page (browsers) or the attempt's status URL (API clients).
///
/// # Errors
///
/// Never fails; rejected redirects become login redirects.
pub async fn oauth_callback(
    req: HttpRequest,
    provider: web::Path<String>,
    query: Option<web::Query<CallbackQuery>>,
    registry: web::Data<AttemptRegistry>,
    settings: web::Data<BridgeSettings>,
) -> Result<HttpResponse> {
    LoggingHelper::log_callback_debug(&req);

    let provider_param = provider.into_inner();
    let query = query.map(web::Query::into_inner).unwrap_or_default();

    let request =
        match CallbackRequest::from_redirect(&provider_param, &query, extract_client_info(&req)) {
            Ok(request) => request,
            Err(rejection) => {
                LoggingHelper::log_callback_rejected(&provider_param, &rejection.to_string());
                return Ok(ResponseBuilder::login_redirect(
                    &settings.routes.login_path,
                    rejection.kind(),
                ));
            }
        };

    let attempt = registry.begin(request, SessionCookies::from_request(&req));
    let status_url = attempt_status_url(attempt.id());

    if is_browser_request(&req) {
        Ok(ResponseBuilder::html(render_callback_page(
            attempt.provider(),
            attempt.id(),
            &status_url,
            &settings.routes.login_path,
            settings.callback.timeout_seconds,
        )))
    } else {
        Ok(ResponseBuilder::accepted().json(&AttemptCreatedResponse {
            attempt_id: attempt.id().to_string(),
            status_url,
        }))
    }
}

/// Current state of an attempt
///
/// Once the attempt has settled, the cookies it hands off are attached so the
/// browser stores the session before following `redirectTo`. A pending
/// attempt carries none, even if the backend already answered.
///
/// # Errors
///
/// Never fails; unknown attempts are a 404.
pub async fn attempt_status(
    attempt_id: web::Path<String>,
    registry: web::Data<AttemptRegistry>,
    settings: web::Data<BridgeSettings>,
) -> Result<HttpResponse> {
    let Some(attempt) = registry.get(&attempt_id) else {
        return Ok(ResponseBuilder::not_found());
    };

    let snapshot = attempt.snapshot();
    let view = attempt_view(&snapshot, &settings.routes);

    Ok(ResponseBuilder::ok()
        .with_cookies(attempt.settled_cookies())
        .json(&view))
}

/// Page teardown: cancels the attempt's timers and forgets it
///
/// # Errors
///
/// Never fails; unknown attempts are a 404.
pub async fn teardown_attempt(
    attempt_id: web::Path<String>,
    registry: web::Data<AttemptRegistry>,
) -> Result<HttpResponse> {
    if registry.teardown(&attempt_id) {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Ok(ResponseBuilder::not_found())
    }
}

#[must_use]
pub fn attempt_status_url(attempt_id: &str) -> String {
    format!("/auth/attempts/{attempt_id}")
}

#[must_use]
pub fn attempt_view(snapshot: &AttemptSnapshot, routes: &RouteSettings) -> AttemptView {
    let message = match &snapshot.state {
        AttemptState::Failed { message, .. } => Some(message.clone()),
        AttemptState::TimedOut => Some(TIMEOUT_MESSAGE.to_string()),
        _ => None,
    };
    let error = snapshot.state.error_kind();

    let redirect_to = snapshot.navigation.map(|destination| match destination {
        Destination::Authenticated => routes.authenticated_path.clone(),
        Destination::Login => {
            let mut redirect = ResponseBuilder::redirect(&routes.login_path);
            if let Some(kind) = error {
                redirect = redirect.with_error(kind);
            }
            redirect.location().to_string()
        }
    });

    AttemptView {
        attempt_id: snapshot.id.clone(),
        provider: snapshot.provider,
        status: snapshot.state.as_str().to_string(),
        elapsed_seconds: snapshot.elapsed_seconds,
        message,
        error: error.map(|kind| kind.as_str().to_string()),
        redirect_to,
    }
}
