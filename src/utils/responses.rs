//! HTTP response handling
//!
//! One place for the redirects, JSON bodies and error responses the bridge
//! hands back to browsers, including the `Set-Cookie` headers of relayed
//! backend cookies.

use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, HttpResponseBuilder};
use once_cell::sync::Lazy;
use serde_json::json;

use crate::cookies::{RelayedCookie, SessionCookies};
use crate::errors::ErrorKind;

/// Pre-serialized bodies for the responses that never vary
static CACHED_RESPONSES: Lazy<CachedResponses> = Lazy::new(CachedResponses::new);

struct CachedResponses {
    not_found: String,
}

impl CachedResponses {
    fn new() -> Self {
        Self {
            not_found: Self::create_json("not_found", "The requested resource does not exist"),
        }
    }

    fn create_json(error: &str, message: &str) -> String {
        json!({ "error": error, "message": message }).to_string()
    }
}

/// Unified response builder
pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Cached 404 body
    #[must_use]
    pub fn not_found() -> HttpResponse {
        HttpResponse::NotFound()
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .body(CACHED_RESPONSES.not_found.clone())
    }

    /// Create a redirect response (302 Found)
    #[must_use]
    pub fn redirect(location: &str) -> RedirectBuilder {
        RedirectBuilder::new(location)
    }

    /// Redirect to the login page carrying a stable error code
    #[must_use]
    pub fn login_redirect(login_path: &str, kind: ErrorKind) -> HttpResponse {
        Self::redirect(login_path).with_error(kind).build()
    }

    #[must_use]
    pub fn ok() -> JsonResponseBuilder {
        JsonResponseBuilder::new(StatusCode::OK)
    }

    #[must_use]
    pub fn accepted() -> JsonResponseBuilder {
        JsonResponseBuilder::new(StatusCode::ACCEPTED)
    }

    /// HTML page, never cached
    #[must_use]
    pub fn html(body: String) -> HttpResponse {
        HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, "text/html; charset=utf-8"))
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .body(body)
    }
}

/// Builder for redirect responses
pub struct RedirectBuilder {
    location: String,
    cookies: Vec<RelayedCookie>,
}

impl RedirectBuilder {
    fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            cookies: Vec::new(),
        }
    }

    /// Attach every cookie relayed into `store` during this request
    #[must_use]
    pub fn with_relayed_cookies(mut self, store: &SessionCookies) -> Self {
        self.cookies.extend(store.pending_set_cookies());
        self
    }

    /// Add an `error` query parameter to the redirect URL
    #[must_use]
    pub fn with_error(mut self, kind: ErrorKind) -> Self {
        let separator = if self.location.contains('?') { '&' } else { '?' };
        self.location = format!(
            "{}{separator}error={}",
            self.location,
            urlencoding::encode(kind.as_str())
        );
        self
    }

    /// Target the redirect will point at
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn build(self) -> HttpResponse {
        let mut builder = HttpResponse::Found();
        append_cookies(&mut builder, &self.cookies);
        builder
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .append_header((header::LOCATION, self.location))
            .finish()
    }
}

/// Builder for JSON responses
pub struct JsonResponseBuilder {
    status: StatusCode,
    cookies: Vec<RelayedCookie>,
}

impl JsonResponseBuilder {
    const fn new(status: StatusCode) -> Self {
        Self {
            status,
            cookies: Vec::new(),
        }
    }

    /// Attach cookies to hand to the browser
    #[must_use]
    pub fn with_cookies(mut self, cookies: Vec<RelayedCookie>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    #[must_use]
    pub fn json<T: serde::Serialize>(self, data: &T) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status);
        append_cookies(&mut builder, &self.cookies);
        builder
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .json(data)
    }
}

/// Emit relayed cookies as `Set-Cookie` headers
///
/// Cookies carrying attributes the cookie crate has no field for are written
/// from their full rendering so those attributes survive.
fn append_cookies(builder: &mut HttpResponseBuilder, cookies: &[RelayedCookie]) {
    for cookie in cookies {
        if cookie.extensions.is_empty() {
            builder.cookie(cookie.to_cookie());
        } else {
            builder.append_header((header::SET_COOKIE, cookie.to_set_cookie_header()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::relay;

    fn location(response: &HttpResponse) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap()
    }

    fn set_cookies(response: &HttpResponse) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .filter_map(|v| v.to_str().ok())
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_login_redirect_carries_error_code() {
        let response = ResponseBuilder::login_redirect("/login", ErrorKind::InvalidProvider);
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "/login?error=invalid_provider");

        let response = ResponseBuilder::redirect("/login?next=%2Fdashboard")
            .with_error(ErrorKind::Timeout)
            .build();
        assert_eq!(location(&response), "/login?next=%2Fdashboard&error=timeout");
    }

    #[test]
    fn test_redirect_attaches_relayed_cookies() {
        let store = SessionCookies::new();
        relay(
            &store,
            ["oauth_state=n0nce; Path=/; HttpOnly", "other=1; Max-Age=60"],
        );

        let response = ResponseBuilder::redirect("https://accounts.example/auth")
            .with_relayed_cookies(&store)
            .build();

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().any(|c| c.starts_with("oauth_state=n0nce")));
        assert!(cookies.iter().any(|c| c.starts_with("other=1")));
    }

    #[test]
    fn test_cookie_extensions_survive() {
        let store = SessionCookies::new();
        relay(
            &store,
            ["sid=abc; Path=/; Secure; Partitioned; Priority=High"],
        );

        let response = ResponseBuilder::ok()
            .with_cookies(store.pending_set_cookies())
            .json(&json!({}));

        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("sid=abc"));
        assert!(cookies[0].contains("Path=/"));
        assert!(cookies[0].ends_with("; Partitioned; Priority=High"));
    }

    #[test]
    fn test_not_found_is_json() {
        let response = ResponseBuilder::not_found();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_json_response_builder() {
        let data = json!({"hasSession": true});
        assert_eq!(ResponseBuilder::ok().json(&data).status(), StatusCode::OK);
        assert_eq!(
            ResponseBuilder::accepted().json(&data).status(),
            StatusCode::ACCEPTED
        );
    }
}
