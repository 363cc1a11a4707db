// Configuration management

use crate::core::errors::ProxyError;
use axum::http::HeaderValue;
use secrecy::{ExposeSecret, Secret};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Base URL plus optional bearer credential of one upstream service
#[derive(Debug, Clone)]
pub struct RouteTarget {
    pub base_url: String,
    pub bearer: Option<Secret<String>>,
}

impl RouteTarget {
    pub fn new(base_url: impl Into<String>, bearer: Option<&str>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer: bearer
                .filter(|token| !token.is_empty())
                .map(|token| Secret::new(token.to_string())),
        }
    }

    /// Join base URL and path with exactly one `/` between them
    pub fn join(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Bearer credential, if one is configured
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer.as_ref().map(|secret| secret.expose_secret().as_str())
    }
}

/// What the Safety Gate answers when the guard service cannot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardFailMode {
    /// Treat the text as not blocked (keeps the RAG service available)
    Open,
    /// Treat the text as blocked
    Closed,
}

impl FromStr for GuardFailMode {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(GuardFailMode::Open),
            "closed" => Ok(GuardFailMode::Closed),
            other => Err(ProxyError::Configuration(format!(
                "Invalid GUARD_FAIL_MODE '{}': must be 'open' or 'closed'",
                other
            ))),
        }
    }
}

/// Application configuration loaded from environment variables
///
/// Read once at startup and shared read-only (`Arc<Config>`) afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    // Server configuration
    pub bind_address: String,
    pub port: u16,

    // Upstreams
    pub rag: RouteTarget,
    pub guard: RouteTarget,

    // RAG forwarding (generation can be slow)
    pub rag_timeout_secs: u64,
    pub rag_connect_timeout_secs: u64,

    // PII guard
    pub guard_check_timeout_secs: u64,
    pub guard_passthrough_timeout_secs: u64,
    pub guard_fail_mode: GuardFailMode,
    pub guard_cb_failure_threshold: u32,
    pub guard_cb_cooldown_secs: u64,

    // Middleware configuration
    pub cors_allowed_origins: Vec<String>,
    pub body_size_limit_bytes: usize,

    // Logging configuration
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Supports `.env` file loading in development (via dotenv crate).
    /// Validates every value before returning.
    pub fn from_env() -> Result<Self, ProxyError> {
        // Load .env file if present (development)
        #[cfg(not(test))]
        {
            dotenv::dotenv().ok(); // Ignore errors (file may not exist)
        }

        let rag_api_key = Self::get_env_or_default("RAGFLOW_API_KEY", "");
        let guard_api_key = Self::get_env_or_default("PII_GUARD_API_KEY", "");

        let config = Self {
            bind_address: Self::get_env_or_default("BIND_ADDRESS", "0.0.0.0"),
            port: Self::parse_port()?,
            rag: RouteTarget::new(
                Self::get_env_or_default("RAGFLOW_BASE_URL", "http://zipbuntu.iptime.org"),
                Some(&rag_api_key),
            ),
            guard: RouteTarget::new(
                Self::get_env_or_default("PII_GUARD_URL", "http://localhost:3000"),
                Some(&guard_api_key),
            ),
            rag_timeout_secs: Self::parse_or_default("RAG_TIMEOUT_SECS", 600)?,
            rag_connect_timeout_secs: Self::parse_or_default("RAG_CONNECT_TIMEOUT_SECS", 60)?,
            guard_check_timeout_secs: Self::parse_or_default("GUARD_CHECK_TIMEOUT_SECS", 10)?,
            guard_passthrough_timeout_secs: Self::parse_or_default("GUARD_PASSTHROUGH_TIMEOUT_SECS", 30)?,
            guard_fail_mode: Self::get_env_or_default("GUARD_FAIL_MODE", "open").parse()?,
            guard_cb_failure_threshold: Self::parse_or_default("GUARD_CB_FAILURE_THRESHOLD", 5)?,
            guard_cb_cooldown_secs: Self::parse_or_default("GUARD_CB_COOLDOWN_SECS", 5)?,
            cors_allowed_origins: Self::parse_list(&Self::get_env_or_default(
                "CORS_ALLOWED_ORIGINS",
                "http://localhost:3000,http://127.0.0.1:3000",
            )),
            body_size_limit_bytes: Self::parse_or_default("BODY_SIZE_LIMIT_BYTES", 100 * 1024 * 1024)?,
            log_level: Self::get_env_or_default("LOG_LEVEL", "info"),
            log_format: Self::get_env_or_default("LOG_FORMAT", "json"),
        };

        // Post-load validation
        config.validate()?;

        Ok(config)
    }

    pub fn rag_timeout(&self) -> Duration {
        Duration::from_secs(self.rag_timeout_secs)
    }

    pub fn rag_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.rag_connect_timeout_secs)
    }

    pub fn guard_check_timeout(&self) -> Duration {
        Duration::from_secs(self.guard_check_timeout_secs)
    }

    pub fn guard_passthrough_timeout(&self) -> Duration {
        Duration::from_secs(self.guard_passthrough_timeout_secs)
    }

    pub fn guard_cb_cooldown(&self) -> Duration {
        Duration::from_secs(self.guard_cb_cooldown_secs)
    }

    /// Get environment variable or return default value
    fn get_env_or_default(key: &str, default: &str) -> String {
        env::var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Parse port from PORT environment variable
    fn parse_port() -> Result<u16, ProxyError> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "8000".to_string());
        let port = port_str.parse::<u16>()
            .map_err(|e| ProxyError::Configuration(
                format!("Invalid PORT value '{}': {}", port_str, e)
            ))?;

        if port == 0 {
            return Err(ProxyError::Configuration(
                "PORT must be between 1 and 65535".to_string()
            ));
        }

        Ok(port)
    }

    /// Parse a positive number from an environment variable or return default
    fn parse_or_default<T>(key: &str, default: T) -> Result<T, ProxyError>
    where
        T: FromStr + PartialEq + Default,
        T::Err: std::fmt::Display,
    {
        match env::var(key) {
            Ok(value) => Self::parse_positive(&value, key),
            Err(_) => Ok(default),
        }
    }

    /// Parse a positive number (zero rejected)
    fn parse_positive<T>(value: &str, key: &str) -> Result<T, ProxyError>
    where
        T: FromStr + PartialEq + Default,
        T::Err: std::fmt::Display,
    {
        let parsed = value.trim().parse::<T>()
            .map_err(|e| ProxyError::Configuration(
                format!("Invalid {} value '{}': {}", key, value, e)
            ))?;

        if parsed == T::default() {
            return Err(ProxyError::Configuration(
                format!("{} must be greater than 0", key)
            ));
        }

        Ok(parsed)
    }

    /// Split a comma-separated list, dropping blanks
    fn parse_list(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Validate all configuration values
    fn validate(&self) -> Result<(), ProxyError> {
        Self::validate_url(&self.rag.base_url, "RAGFlow base")?;
        Self::validate_url(&self.guard.base_url, "PII Guard")?;

        for origin in &self.cors_allowed_origins {
            Self::validate_origin(origin)?;
        }

        if self.rag_connect_timeout_secs > self.rag_timeout_secs {
            return Err(ProxyError::Configuration(format!(
                "RAG_CONNECT_TIMEOUT_SECS ({}) must not exceed RAG_TIMEOUT_SECS ({})",
                self.rag_connect_timeout_secs, self.rag_timeout_secs
            )));
        }

        Self::validate_log_level(&self.log_level)?;
        Self::validate_log_format(&self.log_format)?;

        Ok(())
    }

    /// Validate URL format (http or https only)
    fn validate_url(url: &str, description: &str) -> Result<(), ProxyError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| ProxyError::Configuration(
                format!("Invalid {} URL '{}': {}", description, url, e)
            ))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ProxyError::Configuration(format!(
                "Invalid {} URL '{}': scheme must be http or https",
                description, url
            )));
        }
        Ok(())
    }

    /// Validate a CORS origin (must be usable as a header value)
    fn validate_origin(origin: &str) -> Result<(), ProxyError> {
        HeaderValue::from_str(origin)
            .map(|_| ())
            .map_err(|e| ProxyError::Configuration(
                format!("Invalid CORS origin '{}': {}", origin, e)
            ))
    }

    /// Validate log level
    fn validate_log_level(level: &str) -> Result<(), ProxyError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level.to_lowercase().as_str()) {
            return Err(ProxyError::Configuration(
                format!("Invalid LOG_LEVEL '{}': must be one of {}", level, valid_levels.join(", "))
            ));
        }
        Ok(())
    }

    /// Validate log format
    fn validate_log_format(format: &str) -> Result<(), ProxyError> {
        if format != "json" && format != "text" {
            return Err(ProxyError::Configuration(
                format!("Invalid LOG_FORMAT '{}': must be 'json' or 'text'", format)
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Create a test configuration for unit tests
    ///
    /// This bypasses environment variable loading for tests that
    /// point the upstreams at mock servers themselves.
    pub fn test_config() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            rag: RouteTarget::new("http://127.0.0.1:9380", Some("test-rag-key")),
            guard: RouteTarget::new("http://127.0.0.1:3000", None),
            rag_timeout_secs: 600,
            rag_connect_timeout_secs: 60,
            guard_check_timeout_secs: 10,
            guard_passthrough_timeout_secs: 30,
            guard_fail_mode: GuardFailMode::Open,
            guard_cb_failure_threshold: 5,
            guard_cb_cooldown_secs: 5,
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            body_size_limit_bytes: 2 * 1024 * 1024,
            log_level: "info".to_string(),
            log_format: "json".to_string(),
        }
    }
}
