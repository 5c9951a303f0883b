//! Adapter configuration
//!
//! Loaded from a TOML file with camelCase keys, then overridden from
//! `INSTRUMENT_*` environment variables, then validated:
//!
//! ```toml
//! platformUrl = "https://platform.example.com"
//! apiKey = "0123456789abcdef0123"
//! operatorId = "OP-001"
//! timeout = 30000
//! retryAttempts = 3
//! logLevel = "info"
//! enableMetrics = true
//! ```

use crate::error::AdapterError;
use instrument_shared::limits;
use instrument_shared::validation::{Validate, Violations, IDENTIFIER_PATTERN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "INSTRUMENT_";

/// Verbosity of the adapter's logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(AdapterError::Config(format!("unknown log level '{}'", other))),
        }
    }
}

fn default_timeout() -> u64 {
    limits::DEFAULT_TIMEOUT_MS
}

fn default_retry_attempts() -> u32 {
    limits::DEFAULT_RETRY_ATTEMPTS
}

/// Settings an adapter is constructed from
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdapterConfig {
    /// Base URL of the platform API
    pub platform_url: String,
    pub api_key: String,
    /// Operator the adapter acts on behalf of
    pub operator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_name: Option<String>,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub enable_metrics: bool,
}

impl fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("platform_url", &self.platform_url)
            .field("api_key", &"<redacted>")
            .field("operator_id", &self.operator_id)
            .field("operator_name", &self.operator_name)
            .field("timeout", &self.timeout)
            .field("retry_attempts", &self.retry_attempts)
            .field("log_level", &self.log_level)
            .field("enable_metrics", &self.enable_metrics)
            .finish()
    }
}

impl AdapterConfig {
    /// Create a config with default timeout, retries and logging
    pub fn new(
        platform_url: impl Into<String>,
        api_key: impl Into<String>,
        operator_id: impl Into<String>,
    ) -> Self {
        Self {
            platform_url: platform_url.into(),
            api_key: api_key.into(),
            operator_id: operator_id.into(),
            operator_name: None,
            timeout: default_timeout(),
            retry_attempts: default_retry_attempts(),
            log_level: LogLevel::default(),
            enable_metrics: false,
        }
    }

    /// Parse a TOML document without applying overrides or validation
    pub fn from_toml_str(contents: &str) -> Result<Self, AdapterError> {
        toml::from_str(contents).map_err(|e| AdapterError::Config(e.to_string()))
    }

    /// Load from a TOML file, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AdapterError::Config(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml_str(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `INSTRUMENT_*` overrides from the given lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), AdapterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(url) = var("PLATFORM_URL") {
            self.platform_url = url;
        }
        if let Some(key) = var("API_KEY") {
            self.api_key = key;
        }
        if let Some(operator) = var("OPERATOR_ID") {
            self.operator_id = operator;
        }
        if let Some(name) = var("OPERATOR_NAME") {
            self.operator_name = Some(name);
        }
        if let Some(timeout) = var("TIMEOUT_MS") {
            self.timeout = parse_number("INSTRUMENT_TIMEOUT_MS", &timeout)?;
        }
        if let Some(attempts) = var("RETRY_ATTEMPTS") {
            self.retry_attempts = parse_number("INSTRUMENT_RETRY_ATTEMPTS", &attempts)?;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level.parse()?;
        }
        if let Some(flag) = var("ENABLE_METRICS") {
            self.enable_metrics = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, AdapterError> {
    value
        .trim()
        .parse()
        .map_err(|_| AdapterError::Config(format!("{} is not a valid number: '{}'", name, value)))
}

impl Validate for AdapterConfig {
    const CONTEXT: &'static str = "AdapterConfig";

    fn collect_violations(&self, v: &mut Violations) {
        match reqwest::Url::parse(&self.platform_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            Ok(_) => v.push("platformUrl", "must be an http(s) URI"),
            Err(e) => v.push("platformUrl", format!("must be a valid uri ({})", e)),
        }
        v.check_length("apiKey", &self.api_key, limits::MIN_API_KEY_LENGTH, usize::MAX);
        v.check_pattern("operatorId", &self.operator_id, &IDENTIFIER_PATTERN);
        v.check_optional_length("operatorName", self.operator_name.as_deref(), 100);
        v.check_range(
            "timeout",
            self.timeout,
            limits::MIN_TIMEOUT_MS,
            limits::MAX_TIMEOUT_MS,
        );
        v.check_range(
            "retryAttempts",
            self.retry_attempts,
            limits::MIN_RETRY_ATTEMPTS,
            limits::MAX_RETRY_ATTEMPTS,
        );
    }
}
