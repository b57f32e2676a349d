//! Supported identity providers
//!
//! The provider set is closed. Strings arriving from URLs are untrusted and are
//! only ever turned into a [`Provider`] through [`Provider::validate`], which
//! rejects anything that is not an exact match.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity providers known to the bridge, plus the `guest` pseudo-provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Discord,
    Github,
    Guest,
}

/// Rejected provider input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported provider: {0:?}")]
pub struct InvalidProvider(pub String);

impl Provider {
    /// Every provider, interactive ones first
    pub const ALL: [Self; 4] = [Self::Google, Self::Discord, Self::Github, Self::Guest];

    /// Validate an untrusted provider string
    ///
    /// # Errors
    ///
    /// Returns [`InvalidProvider`] for anything that is not exactly one of
    /// `google`, `discord`, `github` or `guest`. Case variants are rejected.
    pub fn validate(input: &str) -> Result<Self, InvalidProvider> {
        match input {
            "google" => Ok(Self::Google),
            "discord" => Ok(Self::Discord),
            "github" => Ok(Self::Github),
            "guest" => Ok(Self::Guest),
            other => Err(InvalidProvider(other.to_string())),
        }
    }

    /// Whether the provider uses the redirect/callback dance
    ///
    /// Guests skip it entirely and get a session from a direct backend call.
    #[must_use]
    pub const fn is_interactive(self) -> bool {
        !matches!(self, Self::Guest)
    }

    /// Narrow to an [`InteractiveProvider`], `None` for `guest`
    #[must_use]
    pub const fn interactive(self) -> Option<InteractiveProvider> {
        if self.is_interactive() {
            Some(InteractiveProvider(self))
        } else {
            None
        }
    }

    /// Wire name, as sent to the backend in `providerType`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Discord => "discord",
            Self::Github => "github",
            Self::Guest => "guest",
        }
    }

    /// Human readable name for pages
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Discord => "Discord",
            Self::Github => "GitHub",
            Self::Guest => "Guest",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = InvalidProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::validate(s)
    }
}

/// A provider that is statically known not to be `guest`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct InteractiveProvider(Provider);

impl InteractiveProvider {
    #[must_use]
    pub const fn provider(self) -> Provider {
        self.0
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0.as_str()
    }
}

impl fmt::Display for InteractiveProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_exact_names() {
        for provider in Provider::ALL {
            assert_eq!(Provider::validate(provider.as_str()), Ok(provider));
        }
    }

    #[test]
    fn test_validate_rejects_everything_else() {
        let rejected = [
            "",
            "Google",
            "GITHUB",
            " google",
            "google ",
            "apple",
            "guest\0",
            "google;drop table users",
            "../github",
            "discord%00",
            "gıthub",
        ];

        for input in rejected {
            assert_eq!(
                Provider::validate(input),
                Err(InvalidProvider(input.to_string())),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_guest_is_not_interactive() {
        assert!(Provider::Google.is_interactive());
        assert!(Provider::Discord.is_interactive());
        assert!(Provider::Github.is_interactive());
        assert!(!Provider::Guest.is_interactive());

        assert!(Provider::Guest.interactive().is_none());
        assert_eq!(
            Provider::Github.interactive().map(InteractiveProvider::provider),
            Some(Provider::Github)
        );
    }

    #[test]
    fn test_serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&Provider::Discord).unwrap(),
            "\"discord\""
        );
        let interactive = Provider::Google.interactive().unwrap();
        assert_eq!(serde_json::to_string(&interactive).unwrap(), "\"google\"");
        assert!(serde_json::from_str::<Provider>("\"Google\"").is_err());
    }
}
