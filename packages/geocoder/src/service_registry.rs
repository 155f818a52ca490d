//! Geocoding service configuration.
//!
//! The default service is defined in `services/nominatim.toml` and
//! embedded at compile time. Run configurations may override any field
//! (missing fields fall back to the embedded defaults), and the
//! `LAYOFF_MAP_GEOCODER_URL` environment variable overrides the base URL.

use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

/// Environment variable that overrides [`GeocoderConfig::base_url`].
pub const BASE_URL_ENV: &str = "LAYOFF_MAP_GEOCODER_URL";

const NOMINATIM_TOML: &str = include_str!("../services/nominatim.toml");

/// A geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Unique identifier (e.g., `"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Search endpoint (e.g., `"https://nominatim.openstreetmap.org/search.php"`).
    pub base_url: String,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Total attempts per address, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff_ms: u64,
    /// Number of lookups in flight at once.
    pub concurrent_requests: usize,
    /// Minimum delay before each request in milliseconds.
    pub rate_limit_ms: u64,
}

impl GeocoderConfig {
    /// Returns the embedded default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (this is a compile-time
    /// guarantee since the config is embedded).
    #[must_use]
    pub fn embedded() -> Self {
        #[derive(Deserialize)]
        struct Raw {
            id: String,
            name: String,
            base_url: String,
            user_agent: String,
            timeout_secs: u64,
            max_attempts: u32,
            backoff_ms: u64,
            concurrent_requests: usize,
            rate_limit_ms: u64,
        }

        let raw: Raw = toml::de::from_str(NOMINATIM_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse geocoding service 'nominatim': {e}"));

        Self {
            id: raw.id,
            name: raw.name,
            base_url: raw.base_url,
            user_agent: raw.user_agent,
            timeout_secs: raw.timeout_secs,
            max_attempts: raw.max_attempts,
            backoff_ms: raw.backoff_ms,
            concurrent_requests: raw.concurrent_requests,
            rate_limit_ms: raw.rate_limit_ms,
        }
    }

    /// Applies environment overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_base_url_override(std::env::var(BASE_URL_ENV).ok())
    }

    fn with_base_url_override(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            log::info!("Using geocoder URL from {BASE_URL_ENV}: {url}");
            self.base_url = url;
        }
        self
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }

    #[must_use]
    pub const fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self::embedded()
    }
}
