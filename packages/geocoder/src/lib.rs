#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address geocoding for layoff sites.
//!
//! Resolves a free-text address to a latitude/longitude pair through a
//! single pluggable lookup, the [`AddressGeocoder`] trait. Production runs
//! use [`nominatim::NominatimGeocoder`] against the configured Nominatim
//! instance (see [`service_registry`]); tests substitute deterministic
//! stubs.
//!
//! "No match" is a valid answer (`Ok(None)`), not an error. Network
//! failures and malformed responses are errors that [`retry`] classifies
//! as transient and retries with exponential backoff.

pub mod address;
pub mod cache;
pub mod nominatim;
pub mod progress;
pub mod retry;
pub mod service_registry;

use async_trait::async_trait;
use layoff_map_models::Coordinate;
use thiserror::Error;

/// A capability that turns a free-text address into a coordinate.
#[async_trait]
pub trait AddressGeocoder: Send + Sync {
    /// Looks up `query` and returns the first candidate's coordinate, or
    /// `None` if the service found no candidates.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the service could not be reached or
    /// answered with something other than a candidate list.
    async fn lookup(&self, query: &str) -> Result<Option<Coordinate>, GeocodeError>;
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The service answered with a 5xx status.
    #[error("Server error: HTTP {status}")]
    Server {
        /// HTTP status code.
        status: u16,
    },

    /// The service rejected the request (4xx other than 429).
    #[error("Request rejected: HTTP {status}")]
    Rejected {
        /// HTTP status code.
        status: u16,
    },
}

impl GeocodeError {
    /// Returns `true` if the error is likely transient and worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
            }
            Self::Parse { .. } | Self::RateLimited | Self::Server { .. } => true,
            Self::Rejected { .. } => false,
        }
    }
}
