//! Auto-signing policy configuration.
//!
//! [`PolicyConfig`] is passed explicitly to every orchestration call. It can
//! be deserialized from JSON (camelCase keys) or loaded from the environment.
//!
//! # Environment Variables
//!
//! - `AUTO_SIGN_ENABLED` - `true` / `false` (default: `true`)
//! - `AUTO_SIGN_TIMEOUT_MS` - overall deadline per call (default: `30000`)
//! - `AUTO_SIGN_MAX_RETRIES` - attempts per strategy (default: `3`)
//! - `AUTO_SIGN_FALLBACK_BEHAVIOR` - `fail`, `log_only` or `continue` (default: `continue`)
//! - `AUTO_SIGN_LOG_LEVEL` - `debug`, `info`, `warn` or `error` (default: `info`)
//! - `AUTO_SIGN_LOG_AUTH_DETAILS` - include user email/name in events (default: `false`)
//! - `AUTO_SIGN_LOG_SUCCESS` - log successful signing (default: `true`)
//! - `AUTO_SIGN_LOG_FAILURES` - log failed attempts (default: `true`)
//! - `AUTO_SIGN_RUNTIME_MODE` - `test`, `development` or `production`, falling back to `APP_ENV`

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment value could not be parsed.
    #[error("invalid value {value:?} for {key}: expected {expected}")]
    Invalid {
        /// Environment key.
        key: &'static str,
        /// Raw value.
        value: String,
        /// What the key accepts.
        expected: &'static str,
    },
    /// The global tracing subscriber could not be installed.
    #[cfg(feature = "subscriber")]
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

/// What to report when auto-signing times out or cannot build a requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackBehavior {
    /// Report the underlying error message.
    Fail,
    /// Log a warning and report a generic log-only message.
    LogOnly,
    /// Report that manual payment is required.
    #[default]
    Continue,
}

impl FromStr for FallbackBehavior {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "log_only" => Ok(Self::LogOnly),
            "continue" => Ok(Self::Continue),
            _ => Err(()),
        }
    }
}

/// Minimum severity of orchestrator events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-attempt detail.
    Debug,
    /// Outcomes and skipped strategies.
    #[default]
    Info,
    /// Failures and fallbacks.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Returns `true` if an event at `event` severity passes this threshold.
    #[must_use]
    pub fn allows(self, event: Self) -> bool {
        event >= self
    }

    /// Lowercase name, usable as an `EnvFilter` directive.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(()),
        }
    }
}

/// Logging switches for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Minimum severity.
    #[serde(default)]
    pub level: LogLevel,
    /// Include user email and name in events.
    #[serde(default)]
    pub log_authentication_details: bool,
    /// Log successful signing.
    #[serde(default = "default_true")]
    pub log_successful_signing: bool,
    /// Log failed attempts.
    #[serde(default = "default_true")]
    pub log_failed_attempts: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_authentication_details: false,
            log_successful_signing: true,
            log_failed_attempts: true,
        }
    }
}

/// Auto-signing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Master switch.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overall deadline for one call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Attempts per strategy. Zero is treated as one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Outcome reporting on timeout or requirement errors.
    #[serde(default)]
    pub fallback_behavior: FallbackBehavior,
    /// Logging switches.
    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_ms() -> u64 {
    30_000
}

const fn default_max_retries() -> u32 {
    3
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            fallback_behavior: FallbackBehavior::Continue,
            logging: LoggingConfig::default(),
        }
    }
}

impl PolicyConfig {
    /// The overall deadline as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Attempts per strategy, never less than one.
    #[must_use]
    pub fn effective_max_retries(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Loads the policy from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a set variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the policy from an arbitrary key lookup. Unset keys keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a present value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = read("AUTO_SIGN_ENABLED") {
            config.enabled = parse_bool("AUTO_SIGN_ENABLED", value)?;
        }
        if let Some(value) = read("AUTO_SIGN_TIMEOUT_MS") {
            config.timeout_ms = parse_with("AUTO_SIGN_TIMEOUT_MS", value, "milliseconds")?;
        }
        if let Some(value) = read("AUTO_SIGN_MAX_RETRIES") {
            config.max_retries =
                parse_with("AUTO_SIGN_MAX_RETRIES", value, "a non-negative integer")?;
        }
        if let Some(value) = read("AUTO_SIGN_FALLBACK_BEHAVIOR") {
            config.fallback_behavior =
                parse_with("AUTO_SIGN_FALLBACK_BEHAVIOR", value, "fail, log_only or continue")?;
        }
        if let Some(value) = read("AUTO_SIGN_LOG_LEVEL") {
            config.logging.level =
                parse_with("AUTO_SIGN_LOG_LEVEL", value, "debug, info, warn or error")?;
        }
        if let Some(value) = read("AUTO_SIGN_LOG_AUTH_DETAILS") {
            config.logging.log_authentication_details =
                parse_bool("AUTO_SIGN_LOG_AUTH_DETAILS", value)?;
        }
        if let Some(value) = read("AUTO_SIGN_LOG_SUCCESS") {
            config.logging.log_successful_signing = parse_bool("AUTO_SIGN_LOG_SUCCESS", value)?;
        }
        if let Some(value) = read("AUTO_SIGN_LOG_FAILURES") {
            config.logging.log_failed_attempts = parse_bool("AUTO_SIGN_LOG_FAILURES", value)?;
        }

        Ok(config)
    }
}

fn parse_with<T: FromStr>(
    key: &'static str,
    value: String,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid {
            key,
            value,
            expected,
        })
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            expected: "a boolean",
        }),
    }
}

/// Deployment environment, used to select signing strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Automated tests; only test strategies are exposed.
    Test,
    /// Local development.
    #[default]
    Development,
    /// Production.
    Production,
}

impl RuntimeMode {
    /// Reads the mode from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `AUTO_SIGN_RUNTIME_MODE`, then `APP_ENV`.
    ///
    /// Unknown or missing values mean [`RuntimeMode::Development`].
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup("AUTO_SIGN_RUNTIME_MODE")
            .or_else(|| lookup("APP_ENV"))
            .map_or(Self::Development, |value| Self::parse(&value))
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "test" => Self::Test,
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }
}

/// Installs a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the configured level is used.
///
/// # Errors
///
/// Returns [`ConfigError::Subscriber`] if a global subscriber is already set.
#[cfg(feature = "subscriber")]
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| ConfigError::Subscriber(e.to_string()))
}
