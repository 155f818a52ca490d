//! Progress reporting for site geocoding.
//!
//! Geocoding is the only slow stage of a run: the public Nominatim
//! instance answers one site per second. The site registry reports one unit
//! per site through [`ProgressCallback`], and the CLI renders it as a
//! terminal bar. Library callers that want no output pass no callback.

/// Receives site-geocoding progress.
///
/// Shared across concurrent lookups, so implementations must be
/// `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Number of sites that will be looked up.
    fn set_total(&self, total: u64);

    /// `delta` more sites are done, located or not.
    fn inc(&self, delta: u64);

    /// Replaces the label shown next to the counter.
    fn set_message(&self, msg: String);

    /// Geocoding finished; `msg` summarizes the outcome.
    fn finish(&self, msg: String);
}
