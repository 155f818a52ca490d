//! Bounded retry with exponential backoff for geocoding lookups.
//!
//! Only errors that [`GeocodeError::is_transient`] accepts are retried
//! (timeouts, connection failures, 429, 5xx, malformed bodies). Rejected
//! requests fail on the first attempt.
//!
//! ```ignore
//! let policy = RetryPolicy::new(5, Duration::from_secs(2));
//! let coordinate = retry::lookup_with_retry(&geocoder, "1 Main St", &policy).await?;
//! ```

use std::time::Duration;

use layoff_map_models::Coordinate;

use crate::{AddressGeocoder, GeocodeError};

/// Upper bound on the backoff exponent so delays cannot overflow.
const MAX_BACKOFF_SHIFT: u32 = 10;

/// How many times to try a lookup and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry
    /// (e.g. 2s, 4s, 8s, 16s).
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// A single attempt and no retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.base_delay.saturating_mul(1u32 << shift)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2))
    }
}

/// Looks up `query`, retrying transient failures per `policy`.
///
/// # Errors
///
/// Returns the last [`GeocodeError`] once every attempt has failed, or the
/// first non-transient error.
pub async fn lookup_with_retry(
    geocoder: &dyn AddressGeocoder,
    query: &str,
    policy: &RetryPolicy,
) -> Result<Option<Coordinate>, GeocodeError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match geocoder.lookup(query).await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                log::warn!("  transient error for '{query}': {e}");
                log::warn!(
                    "  retry {attempt}/{} in {delay:?}...",
                    max_attempts - 1
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
