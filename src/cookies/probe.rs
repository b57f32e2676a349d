//! Cheap session presence check
//!
//! The probe only answers "is there a session cookie". It drives UI
//! affordances such as showing "Dashboard" instead of "Get Started"; whether
//! the session is actually valid is decided by the backend on every protected
//! request.

use super::store::SessionCookies;

/// Session presence hint over a request-scoped cookie store
#[derive(Debug, Clone, Copy)]
pub struct SessionProbe<'a> {
    cookies: &'a SessionCookies,
    cookie_name: &'a str,
}

impl<'a> SessionProbe<'a> {
    #[must_use]
    pub const fn new(cookies: &'a SessionCookies, cookie_name: &'a str) -> Self {
        Self {
            cookies,
            cookie_name,
        }
    }

    /// Whether the designated session cookie is present and not removed
    #[must_use]
    pub fn has_session_cookie(&self) -> bool {
        self.cookies
            .get(self.cookie_name)
            .is_some_and(|value| !value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::relay;

    #[test]
    fn test_probe_reads_inbound_cookie() {
        let store = SessionCookies::from_cookie_header("oauth_session=abc");
        assert!(SessionProbe::new(&store, "oauth_session").has_session_cookie());
        assert!(!SessionProbe::new(&store, "session").has_session_cookie());
    }

    #[test]
    fn test_probe_ignores_empty_and_removed_cookies() {
        let empty = SessionCookies::from_cookie_header("oauth_session=");
        assert!(!SessionProbe::new(&empty, "oauth_session").has_session_cookie());

        let removed = SessionCookies::from_cookie_header("oauth_session=abc");
        relay(&removed, ["oauth_session=; Max-Age=0; Path=/"]);
        assert!(!SessionProbe::new(&removed, "oauth_session").has_session_cookie());
    }

    #[test]
    fn test_probe_sees_relayed_session() {
        let store = SessionCookies::new();
        let probe = SessionProbe::new(&store, "oauth_session");
        assert!(!probe.has_session_cookie());

        relay(&store, ["oauth_session=fresh; HttpOnly; Secure"]);
        assert!(probe.has_session_cookie());
    }
}
