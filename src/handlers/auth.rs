// Sign-in handler: guest sessions and provider authorization redirects
use actix_web::{web, HttpRequest, HttpResponse, Result};
use log::{info, warn};

use crate::cookies::SessionCookies;
use crate::errors::ErrorKind;
use crate::gateway::{AuthError, AuthGateway};
use crate::provider::Provider;
use crate::settings::BridgeSettings;
use crate::utils::responses::ResponseBuilder;

/// Start a sign-in for `provider`
///
/// Guests get a backend session straight away. Interactive providers are sent
/// to the authorization URL the backend generates; the state-nonce cookie
/// the backend sets on that response travels with the redirect so it comes
/// back on the callback exchange.
///
/// # Errors
///
/// Never fails; every problem ends in a redirect to the login page.
pub async fn sign_in(
    req: HttpRequest,
    provider: web::Path<String>,
    gateway: web::Data<dyn AuthGateway>,
    settings: web::Data<BridgeSettings>,
) -> Result<HttpResponse> {
    let provider_param = provider.into_inner();
    let routes = &settings.routes;

    let provider = match Provider::validate(&provider_param) {
        Ok(provider) => provider,
        Err(e) => {
            warn!("🚫 Rejected sign-in: {e}");
            return Ok(ResponseBuilder::login_redirect(
                &routes.login_path,
                ErrorKind::InvalidProvider,
            ));
        }
    };

    let cookies = SessionCookies::from_request(&req);

    let Some(interactive) = provider.interactive() else {
        return Ok(match gateway.create_guest_session(&cookies).await {
            Ok(()) => {
                info!("👤 Guest session created");
                ResponseBuilder::redirect(&routes.authenticated_path)
                    .with_relayed_cookies(&cookies)
                    .build()
            }
            Err(e) => failure_redirect(&routes.login_path, &e, &cookies),
        });
    };

    Ok(
        match gateway.request_authorization_url(interactive, &cookies).await {
            Ok(code_url) => {
                info!("🔐 Redirecting to {} authorization", provider.display_name());
                ResponseBuilder::redirect(code_url.as_str())
                    .with_relayed_cookies(&cookies)
                    .build()
            }
            Err(e) => failure_redirect(&routes.login_path, &e, &cookies),
        },
    )
}

fn failure_redirect(login_path: &str, error: &AuthError, cookies: &SessionCookies) -> HttpResponse {
    ResponseBuilder::redirect(login_path)
        .with_error(error.kind())
        .with_relayed_cookies(cookies)
        .build()
}
