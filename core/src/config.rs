//! Executor defaults and how they are loaded.
//!
//! Resolution order for each policy field: the descriptor's own value, then
//! the `FetchConfig` the executor was built with, then the compiled default.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_MAX_RETRIES: u32 = 0;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Executor-wide policy defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Retry decode and validation failures along with transport, timeout
    /// and status failures.
    pub retry_invalid_bodies: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            retry_invalid_bodies: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    retry_invalid_bodies: Option<bool>,
}

impl RawConfig {
    fn apply(self, mut config: FetchConfig) -> FetchConfig {
        if let Some(ms) = self.timeout_ms {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(flag) = self.retry_invalid_bodies {
            config.retry_invalid_bodies = flag;
        }
        config
    }
}

impl FetchConfig {
    /// Parse a TOML document. Every key is optional; durations are in
    /// milliseconds.
    ///
    /// ```toml
    /// timeout_ms = 5000
    /// max_retries = 2
    /// retry_delay_ms = 250
    /// retry_invalid_bodies = false
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(input)?;
        Ok(raw.apply(FetchConfig::default()))
    }

    /// Read `FETCH_TIMEOUT_MS`, `FETCH_MAX_RETRIES`, `FETCH_RETRY_DELAY_MS`
    /// and `FETCH_RETRY_INVALID_BODIES`. Unset variables keep the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw = RawConfig {
            timeout_ms: parse_var(&lookup, "FETCH_TIMEOUT_MS")?,
            max_retries: parse_var(&lookup, "FETCH_MAX_RETRIES")?,
            retry_delay_ms: parse_var(&lookup, "FETCH_RETRY_DELAY_MS")?,
            retry_invalid_bodies: parse_var(&lookup, "FETCH_RETRY_INVALID_BODIES")?,
        };
        Ok(raw.apply(FetchConfig::default()))
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, Duration::from_millis(10_000));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_delay, Duration::from_millis(1_000));
        assert!(!config.retry_invalid_bodies);
    }

    #[test]
    fn toml_overrides_only_present_keys() {
        let config = FetchConfig::from_toml_str("max_retries = 3\nretry_delay_ms = 50\n").unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(50));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        let err = FetchConfig::from_toml_str("timeout = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn env_lookup_parses_values() {
        let vars: HashMap<&str, &str> = [
            ("FETCH_TIMEOUT_MS", "250"),
            ("FETCH_MAX_RETRIES", " 4 "),
            ("FETCH_RETRY_INVALID_BODIES", "true"),
        ]
        .into_iter()
        .collect();
        let config = FetchConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.retry_delay, DEFAULT_RETRY_DELAY);
        assert!(config.retry_invalid_bodies);
    }

    #[test]
    fn env_lookup_reports_bad_values() {
        let err = FetchConfig::from_lookup(|name| (name == "FETCH_MAX_RETRIES").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "FETCH_MAX_RETRIES", .. }));
    }
}
