//! Cookie handling: relay of upstream cookies, the request-scoped store, and
//! the session presence probe.

pub mod probe;
pub mod relay;
pub mod store;

pub use probe::SessionProbe;
pub use relay::{relay, CookieParseError, RelaySummary, RelayedCookie};
pub use store::SessionCookies;

/// Default name of the backend session cookie
pub const SESSION_COOKIE_NAME: &str = "oauth_session";

/// Cookie the backend uses to carry the OAuth state nonce between
/// authorization-URL generation and the callback exchange
pub const STATE_NONCE_COOKIE_NAME: &str = "oauth_state";
