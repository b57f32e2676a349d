use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::callback::AttemptTiming;
use crate::cookies::SESSION_COOKIE_NAME;

const SETTINGS_FILE: &str = "Settings.toml";
const CONFIG_DIR_ENV: &str = "AUTHBRIDGE_CONFIG_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BridgeSettings {
    pub application: ApplicationSettings,
    pub backend: BackendSettings,
    pub routes: RouteSettings,
    pub callback: CallbackSettings,
    pub cookies: CookieSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL of the backend API
    pub api_url: String,
    /// Per-request timeout; an expired request is reported as a network error
    pub request_timeout_seconds: u64,
}

/// Where the browser is sent after an attempt settles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    pub login_path: String,
    pub authenticated_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackSettings {
    pub timeout_seconds: u64,
    /// Delay before the login redirect after a failure or timeout
    pub grace_seconds: u64,
    /// How long settled or abandoned attempts stay queryable
    pub attempt_retention_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub session_cookie_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: "http://localhost:3000,http://localhost:8080".to_string(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:4000".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            authenticated_path: "/dashboard".to_string(),
        }
    }
}

impl Default for CallbackSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            grace_seconds: 2,
            attempt_retention_seconds: 300,
        }
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            session_cookie_name: SESSION_COOKIE_NAME.to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl BridgeSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// Reads `.env` first and initializes the logger once settings are known.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A settings file cannot be read or parsed
    /// - The resulting settings fail validation
    pub fn load() -> Result<Self> {
        Self::load_env_file(Path::new(".env"));

        let config_dir = std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from);
        let mut settings = Self::load_base_settings(Path::new("."), config_dir.as_deref())?;
        settings.apply_env_overrides();

        Self::initialize_logging(&settings.logging);
        settings.validate()?;

        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `AUTHBRIDGE_CONFIG_DIR` (if specified and exists)
    /// 3. Settings.toml in the working directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but cannot be read or parsed.
    pub fn load_base_settings(working_dir: &Path, config_dir: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();

        let default_path = working_dir.join(SETTINGS_FILE);
        if default_path.exists() {
            settings = Self::read_file(&default_path)?;
            println!("✓ Loaded base settings from {}", default_path.display());
        }

        if let Some(dir) = config_dir {
            let override_path = dir.join(SETTINGS_FILE);
            if override_path.exists() {
                settings = Self::read_file(&override_path)?;
                println!("✓ Overriding settings from {}", override_path.display());
            } else {
                println!(
                    "ℹ {CONFIG_DIR_ENV} set but no Settings.toml found at: {}",
                    override_path.display()
                );
            }
        }

        Ok(settings)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        basic_toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(&mut self) {
        let app = &mut self.application;
        override_string("HOST", &mut app.host);
        override_parsed("PORT", &mut app.port);
        override_string("CORS_ORIGINS", &mut app.cors_origins);

        override_string("API_URL", &mut self.backend.api_url);
        override_parsed(
            "BACKEND_TIMEOUT_SECONDS",
            &mut self.backend.request_timeout_seconds,
        );

        override_string("LOGIN_PATH", &mut self.routes.login_path);
        override_string("AUTHENTICATED_PATH", &mut self.routes.authenticated_path);

        let callback = &mut self.callback;
        override_parsed("CALLBACK_TIMEOUT_SECONDS", &mut callback.timeout_seconds);
        override_parsed("CALLBACK_GRACE_SECONDS", &mut callback.grace_seconds);
        override_parsed(
            "ATTEMPT_RETENTION_SECONDS",
            &mut callback.attempt_retention_seconds,
        );

        override_string("SESSION_COOKIE_NAME", &mut self.cookies.session_cookie_name);
        override_string("RUST_LOG", &mut self.logging.level);
    }

    /// Check values that would otherwise fail at request time
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        let api_url = Url::parse(&self.backend.api_url)
            .with_context(|| format!("Invalid backend.api_url: {}", self.backend.api_url))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            bail!("backend.api_url must use http or https");
        }
        if self.backend.request_timeout_seconds == 0 {
            bail!("backend.request_timeout_seconds must be greater than zero");
        }
        if self.callback.timeout_seconds == 0 {
            bail!("callback.timeout_seconds must be greater than zero");
        }
        for (name, path) in [
            ("routes.login_path", &self.routes.login_path),
            ("routes.authenticated_path", &self.routes.authenticated_path),
        ] {
            if !path.starts_with('/') || path.starts_with("//") {
                bail!("{name} must be a site-relative path: {path}");
            }
        }
        if self.cookies.session_cookie_name.trim().is_empty() {
            bail!("cookies.session_cookie_name must not be empty");
        }
        Ok(())
    }

    fn initialize_logging(logging: &LoggingSettings) {
        let result = env_logger::Builder::new()
            .parse_filters(&logging.level)
            .try_init();
        if result.is_err() {
            debug!("Logger already initialized");
        }
    }

    /// Load environment variables from a .env file
    fn load_env_file(path: &Path) {
        if let Ok(contents) = fs::read_to_string(path) {
            for line in contents.lines() {
                let line = line.trim();
                if line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Get CORS origins as a vector of strings
    #[must_use]
    pub fn get_cors_origins(&self) -> Vec<String> {
        self.application
            .cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    #[must_use]
    pub fn attempt_timing(&self) -> AttemptTiming {
        AttemptTiming {
            timeout_seconds: self.callback.timeout_seconds,
            grace: Duration::from_secs(self.callback.grace_seconds),
        }
    }

    #[must_use]
    pub const fn attempt_retention(&self) -> Duration {
        Duration::from_secs(self.callback.attempt_retention_seconds)
    }
}

fn override_string(env_var: &str, target: &mut String) {
    if let Ok(value) = std::env::var(env_var) {
        *target = value;
    }
}

fn override_parsed<T: std::str::FromStr>(env_var: &str, target: &mut T) {
    if let Ok(value_str) = std::env::var(env_var) {
        match value_str.parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => eprintln!("⚠️  Ignoring invalid {env_var}={value_str}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const ENV_VARS: &[&str] = &[
        "HOST",
        "PORT",
        "API_URL",
        "BACKEND_TIMEOUT_SECONDS",
        "LOGIN_PATH",
        "CALLBACK_TIMEOUT_SECONDS",
        "CALLBACK_GRACE_SECONDS",
        "SESSION_COOKIE_NAME",
    ];

    fn clean_env_vars() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    fn write_settings(dir: &Path, contents: &str) {
        let mut file = fs::File::create(dir.join(SETTINGS_FILE)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn test_defaults() {
        let settings = BridgeSettings::default();
        assert_eq!(settings.routes.login_path, "/login");
        assert_eq!(settings.routes.authenticated_path, "/dashboard");
        assert_eq!(settings.callback.timeout_seconds, 60);
        assert_eq!(settings.callback.grace_seconds, 2);
        assert_eq!(settings.cookies.session_cookie_name, "oauth_session");
        assert!(settings.validate().is_ok());

        let timing = settings.attempt_timing();
        assert_eq!(timing.timeout_seconds, 60);
        assert_eq!(timing.grace, Duration::from_secs(2));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_settings(
            dir.path(),
            "[backend]\napi_url = \"https://api.example.com\"\n",
        );

        let settings = BridgeSettings::load_base_settings(dir.path(), None).unwrap();
        assert_eq!(settings.backend.api_url, "https://api.example.com");
        assert_eq!(settings.backend.request_timeout_seconds, 30);
        assert_eq!(settings.callback.timeout_seconds, 60);
    }

    #[test]
    fn test_config_dir_takes_precedence() {
        let working = tempfile::tempdir().unwrap();
        let config = tempfile::tempdir().unwrap();
        write_settings(working.path(), "[callback]\ntimeout_seconds = 30\n");
        write_settings(config.path(), "[callback]\ntimeout_seconds = 45\n");

        let settings =
            BridgeSettings::load_base_settings(working.path(), Some(config.path())).unwrap();
        assert_eq!(settings.callback.timeout_seconds, 45);

        let missing = config.path().join("missing");
        let settings = BridgeSettings::load_base_settings(working.path(), Some(&missing)).unwrap();
        assert_eq!(settings.callback.timeout_seconds, 30);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_settings(dir.path(), "[callback\ntimeout_seconds = ");
        assert!(BridgeSettings::load_base_settings(dir.path(), None).is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clean_env_vars();
        std::env::set_var("API_URL", "https://backend.internal");
        std::env::set_var("CALLBACK_TIMEOUT_SECONDS", "90");
        std::env::set_var("PORT", "not-a-port");
        std::env::set_var("SESSION_COOKIE_NAME", "sid");

        let mut settings = BridgeSettings::default();
        settings.apply_env_overrides();

        assert_eq!(settings.backend.api_url, "https://backend.internal");
        assert_eq!(settings.callback.timeout_seconds, 90);
        assert_eq!(settings.application.port, 8080);
        assert_eq!(settings.cookies.session_cookie_name, "sid");

        clean_env_vars();
    }

    #[test]
    fn test_validation_failures() {
        let mut settings = BridgeSettings::default();
        settings.backend.api_url = "ftp://backend".to_string();
        assert!(settings.validate().is_err());

        let mut settings = BridgeSettings::default();
        settings.routes.login_path = "https://evil.example/login".to_string();
        assert!(settings.validate().is_err());

        let mut settings = BridgeSettings::default();
        settings.routes.authenticated_path = "//evil.example".to_string();
        assert!(settings.validate().is_err());

        let mut settings = BridgeSettings::default();
        settings.callback.timeout_seconds = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_cors_origins() {
        let mut settings = BridgeSettings::default();
        settings.application.cors_origins = "https://a.example, https://b.example,".to_string();
        assert_eq!(
            settings.get_cors_origins(),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }
}
