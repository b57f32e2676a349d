use actix_web::{web, HttpRequest, HttpResponse, Result};

use crate::cookies::{SessionCookies, SessionProbe};
use crate::models::SessionPresenceResponse;
use crate::settings::BridgeSettings;
use crate::utils::responses::ResponseBuilder;

/// Whether the browser holds a session cookie
///
/// A UI hint only: the backend decides whether the session is valid.
///
/// # Errors
///
/// Never fails.
pub async fn session_status(
    req: HttpRequest,
    settings: web::Data<BridgeSettings>,
) -> Result<HttpResponse> {
    let cookies = SessionCookies::from_request(&req);
    let probe = SessionProbe::new(&cookies, &settings.cookies.session_cookie_name);

    Ok(ResponseBuilder::ok().json(&SessionPresenceResponse {
        has_session: probe.has_session_cookie(),
    }))
}
