//! Relay of upstream `Set-Cookie` headers into the request-scoped cookie store
//!
//! Each raw header value is one cookie definition. The first `name=value` pair
//! is the cookie identity; every later `key=value` or bare token is an
//! attribute. Attribute keys are matched case-insensitively and unknown ones
//! are kept verbatim so they survive the trip back to the browser.

use actix_web::cookie::time::{Duration as CookieDuration, OffsetDateTime};
use actix_web::cookie::{Cookie, SameSite};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::store::SessionCookies;

/// RFC 6265 cookie-name (an RFC 7230 token)
static COOKIE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[!#$%&'*+\-.^_`|~0-9A-Za-z]+$").expect("valid cookie name regex"));

/// Legacy `Expires` layouts still emitted by some servers
const LEGACY_EXPIRES_FORMATS: [&str; 3] = [
    "%a, %d-%b-%Y %H:%M:%S GMT",
    "%A, %d-%b-%y %H:%M:%S GMT",
    "%a %b %e %H:%M:%S %Y",
];

/// A cookie parsed from a `Set-Cookie` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedCookie {
    pub name: String,
    /// Value with surrounding double quotes stripped
    pub value: String,
    /// Value exactly as the backend sent it
    pub raw_value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_age_seconds: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    /// Attributes without a dedicated field, as received
    pub extensions: Vec<(String, Option<String>)>,
}

/// Why a single `Set-Cookie` value was skipped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CookieParseError {
    #[error("cookie definition is empty")]
    Empty,
    #[error("cookie definition has no name=value pair")]
    MissingPair,
    #[error("invalid cookie name {0:?}")]
    InvalidName(String),
}

/// Outcome of one relay call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySummary {
    /// Names applied to the store, in first-seen order
    pub applied: Vec<String>,
    /// Number of malformed values that were skipped
    pub skipped: usize,
}

impl RelayedCookie {
    /// Create a cookie with no attributes
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            raw_value: value.clone(),
            value,
            domain: None,
            path: None,
            expires_at: None,
            max_age_seconds: None,
            secure: false,
            http_only: false,
            same_site: None,
            extensions: Vec::new(),
        }
    }

    /// Parse one raw `Set-Cookie` value
    ///
    /// Attributes whose values cannot be interpreted (`Max-Age=soon`, an
    /// unreadable date, an unknown `SameSite` mode) are dropped on their own;
    /// the cookie itself is still returned. When an attribute repeats, the
    /// first occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty, its first segment has no `=`,
    /// or the cookie name is empty or not a valid token.
    pub fn parse(raw: &str) -> Result<Self, CookieParseError> {
        let mut segments = raw.split(';');
        let pair = segments.next().unwrap_or_default().trim();
        if pair.is_empty() {
            return Err(CookieParseError::Empty);
        }

        let (name, value) = pair.split_once('=').ok_or(CookieParseError::MissingPair)?;
        let name = name.trim();
        if !COOKIE_NAME_RE.is_match(name) {
            return Err(CookieParseError::InvalidName(name.to_string()));
        }

        let raw_value = value.trim();
        let mut cookie = Self::new(name, unquote(raw_value));
        cookie.raw_value = raw_value.to_string();
        for segment in segments {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, value) = match segment.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (segment, None),
            };
            cookie.apply_attribute(key, value);
        }

        Ok(cookie)
    }

    fn apply_attribute(&mut self, key: &str, value: Option<&str>) {
        match key.to_ascii_lowercase().as_str() {
            "secure" => self.secure = true,
            "httponly" => self.http_only = true,
            "max-age" => {
                if self.max_age_seconds.is_none() {
                    self.max_age_seconds = value.and_then(|v| parse_or_warn(&self.name, key, v, |v| v.parse().ok()));
                }
            }
            "expires" => {
                if self.expires_at.is_none() {
                    self.expires_at = value.and_then(|v| parse_or_warn(&self.name, key, v, parse_expires));
                }
            }
            "samesite" => {
                if self.same_site.is_none() {
                    self.same_site = value.and_then(|v| parse_or_warn(&self.name, key, v, parse_same_site));
                }
            }
            "domain" => {
                if self.domain.is_none() {
                    self.domain = value.filter(|v| !v.is_empty()).map(ToString::to_string);
                }
            }
            "path" => {
                if self.path.is_none() {
                    self.path = value.filter(|v| !v.is_empty()).map(ToString::to_string);
                }
            }
            _ => {
                let already_present = self
                    .extensions
                    .iter()
                    .any(|(existing, _)| existing.eq_ignore_ascii_case(key));
                if !already_present {
                    self.extensions
                        .push((key.to_string(), value.map(ToString::to_string)));
                }
            }
        }
    }

    /// Fill attributes this cookie lacks from a later definition of the same name
    pub fn merge_missing_from(&mut self, other: Self) {
        if self.domain.is_none() {
            self.domain = other.domain;
        }
        if self.path.is_none() {
            self.path = other.path;
        }
        if self.expires_at.is_none() {
            self.expires_at = other.expires_at;
        }
        if self.max_age_seconds.is_none() {
            self.max_age_seconds = other.max_age_seconds;
        }
        if self.same_site.is_none() {
            self.same_site = other.same_site;
        }
        self.secure |= other.secure;
        self.http_only |= other.http_only;
        for (key, value) in other.extensions {
            if !self
                .extensions
                .iter()
                .any(|(existing, _)| existing.eq_ignore_ascii_case(&key))
            {
                self.extensions.push((key, value));
            }
        }
    }

    /// Whether applying this cookie deletes it
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.is_removal_at(Utc::now())
    }

    /// [`Self::is_removal`] against an explicit clock
    ///
    /// `Max-Age` takes precedence over `Expires` when both are present.
    #[must_use]
    pub fn is_removal_at(&self, now: DateTime<Utc>) -> bool {
        match (self.max_age_seconds, self.expires_at) {
            (Some(max_age), _) => max_age <= 0,
            (None, Some(expires_at)) => expires_at <= now,
            (None, None) => false,
        }
    }

    /// The cookie as the browser should receive it, minus unknown attributes
    #[must_use]
    pub fn to_cookie(&self) -> Cookie<'static> {
        let mut builder = Cookie::build(self.name.clone(), self.raw_value.clone())
            .secure(self.secure)
            .http_only(self.http_only);
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(path) = &self.path {
            builder = builder.path(path.clone());
        }
        if let Some(same_site) = self.same_site {
            builder = builder.same_site(same_site);
        }
        if let Some(max_age) = self.max_age_seconds {
            builder = builder.max_age(CookieDuration::seconds(max_age));
        }
        if let Some(expires_at) = self
            .expires_at
            .and_then(|at| OffsetDateTime::from_unix_timestamp(at.timestamp()).ok())
        {
            builder = builder.expires(expires_at);
        }
        builder.finish()
    }

    /// Serialize back into a `Set-Cookie` header value, unknown attributes included
    #[must_use]
    pub fn to_set_cookie_header(&self) -> String {
        let mut header = self.to_cookie().to_string();
        for (key, value) in &self.extensions {
            header.push_str("; ");
            header.push_str(key);
            if let Some(value) = value {
                header.push('=');
                header.push_str(value);
            }
        }
        header
    }
}

/// Apply a batch of raw `Set-Cookie` values to the store
///
/// An empty batch is a no-op. Malformed values are skipped without affecting
/// the rest of the batch. When a name repeats, the first definition wins and
/// later ones only contribute attributes it lacks, so each name is applied once.
pub fn relay<I, S>(store: &SessionCookies, raw_values: I) -> RelaySummary
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut summary = RelaySummary::default();
    let mut batch: Vec<RelayedCookie> = Vec::new();

    for raw in raw_values {
        match RelayedCookie::parse(raw.as_ref()) {
            Ok(cookie) => {
                if let Some(existing) = batch.iter_mut().find(|c| c.name == cookie.name) {
                    debug!("Merging duplicate Set-Cookie for '{}'", cookie.name);
                    existing.merge_missing_from(cookie);
                } else {
                    batch.push(cookie);
                }
            }
            Err(e) => {
                warn!("Skipping malformed Set-Cookie value: {e}");
                summary.skipped += 1;
            }
        }
    }

    for cookie in batch {
        summary.applied.push(cookie.name.clone());
        store.apply(cookie);
    }

    summary
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_or_warn<T>(
    cookie_name: &str,
    key: &str,
    value: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Option<T> {
    let parsed = parse(value);
    if parsed.is_none() {
        warn!("Dropping unreadable {key} attribute {value:?} on cookie '{cookie_name}'");
    }
    parsed
}

fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    LEGACY_EXPIRES_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|naive| naive.and_utc())
    })
}

fn parse_same_site(value: &str) -> Option<SameSite> {
    match value.to_ascii_lowercase().as_str() {
        "strict" => Some(SameSite::Strict),
        "lax" => Some(SameSite::Lax),
        "none" => Some(SameSite::None),
        _ => None,
    }
}
