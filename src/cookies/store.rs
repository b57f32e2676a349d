//! Request-scoped cookie store
//!
//! [`SessionCookies`] is the one place ambient cookie state lives while a
//! request is being served. It starts from the cookies the browser sent and
//! accumulates whatever the backend set in return. Reads are open to anyone;
//! writes only happen through [`crate::cookies::relay`].

use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::HttpRequest;
use parking_lot::Mutex;

use super::relay::RelayedCookie;

#[derive(Debug, Default)]
struct CookieState {
    /// Cookies received from the browser
    inbound: BTreeMap<String, String>,
    /// Cookies relayed from upstream, keyed by name; the latest write wins
    relayed: BTreeMap<String, RelayedCookie>,
}

/// Ambient cookie state for one request context
///
/// Cloning is cheap and every clone sees the same state.
#[derive(Debug, Clone, Default)]
pub struct SessionCookies {
    inner: Arc<Mutex<CookieState>>,
}

impl SessionCookies {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a raw `Cookie` request header
    ///
    /// Pairs that do not parse as cookies are ignored.
    #[must_use]
    pub fn from_cookie_header(header: &str) -> Self {
        Self::seeded(
            header
                .split(';')
                .map(str::trim)
                .filter(|pair| !pair.is_empty())
                .filter_map(|pair| Cookie::parse(pair).ok())
                .map(|c| (c.name().to_string(), c.value().to_string()))
                .collect(),
        )
    }

    /// Seed a store from the cookies on an incoming request
    #[must_use]
    pub fn from_request(req: &HttpRequest) -> Self {
        Self::seeded(
            req.cookies()
                .map(|cookies| {
                    cookies
                        .iter()
                        .map(|c| (c.name().to_string(), c.value().to_string()))
                        .collect()
                })
                .unwrap_or_default(),
        )
    }

    fn seeded(inbound: BTreeMap<String, String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CookieState {
                inbound,
                relayed: BTreeMap::new(),
            })),
        }
    }

    /// Current value of a cookie, taking relayed writes and removals into account
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let state = self.inner.lock();
        match state.relayed.get(name) {
            Some(cookie) if cookie.is_removal() => None,
            Some(cookie) => Some(cookie.value.clone()),
            None => state.inbound.get(name).cloned(),
        }
    }

    /// Whether a cookie currently has a value
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// `Cookie` header carrying every live cookie, for outgoing requests
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        let state = self.inner.lock();
        let mut effective: BTreeMap<&str, &str> = state
            .inbound
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();

        for (name, cookie) in &state.relayed {
            if cookie.is_removal() {
                effective.remove(name.as_str());
            } else {
                effective.insert(name.as_str(), cookie.raw_value.as_str());
            }
        }

        if effective.is_empty() {
            None
        } else {
            Some(
                effective
                    .into_iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        }
    }

    /// Cookies relayed so far, to be handed to the browser as `Set-Cookie`
    #[must_use]
    pub fn pending_set_cookies(&self) -> Vec<RelayedCookie> {
        self.inner.lock().relayed.values().cloned().collect()
    }

    /// Record a relayed cookie
    pub(crate) fn apply(&self, cookie: RelayedCookie) {
        self.inner.lock().relayed.insert(cookie.name.clone(), cookie);
    }
}
