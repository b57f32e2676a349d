//! Client identification from request headers

use actix_web::HttpRequest;

/// Fallback when no address can be determined
pub const UNKNOWN_IP: &str = "0.0.0.0";

/// Fallback when the client sends no User-Agent
pub const UNKNOWN_FINGERPRINT: &str = "Unknown";

/// Client details forwarded to the backend with a callback exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub fingerprint: String,
}

/// Extract the client IP and fingerprint from an inbound request
///
/// The IP is taken from the first entry of `x-vercel-forwarded-for`, then
/// `x-forwarded-for`, then the peer address. The fingerprint is the
/// `User-Agent` header.
#[must_use]
pub fn extract_client_info(req: &HttpRequest) -> ClientInfo {
    let ip = forwarded_ip(req, "x-vercel-forwarded-for")
        .or_else(|| forwarded_ip(req, "x-forwarded-for"))
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_IP.to_string());

    let fingerprint = header_str(req, "user-agent")
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .map_or_else(|| UNKNOWN_FINGERPRINT.to_string(), ToString::to_string);

    ClientInfo { ip, fingerprint }
}

fn header_str<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|h| h.to_str().ok())
}

fn forwarded_ip(req: &HttpRequest, name: &str) -> Option<String> {
    header_str(req, name)?
        .split(',')
        .map(str::trim)
        .find(|entry| !entry.is_empty())
        .map(ToString::to_string)
}

/// Determine if a request came from a browser vs an API client
/// Browsers typically send Accept headers that include text/html
#[must_use]
pub fn is_browser_request(req: &HttpRequest) -> bool {
    if let Some(accept_str) = header_str(req, "accept") {
        return accept_str.contains("text/html") || accept_str.contains("application/xhtml+xml");
    }

    // Fallback: check User-Agent for common browser patterns
    if let Some(ua_str) = header_str(req, "user-agent") {
        let ua_lower = ua_str.to_lowercase();
        return ua_lower.contains("mozilla")
            || ua_lower.contains("chrome")
            || ua_lower.contains("safari")
            || ua_lower.contains("firefox")
            || ua_lower.contains("edge");
    }

    false
}
