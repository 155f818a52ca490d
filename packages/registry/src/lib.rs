#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Validated registries of layoff sites and schools.
//!
//! Both registries fail fast on duplicate keys so a bad input never
//! reaches the (slow, rate-limited) geocoding step or the cross join.

pub mod schools;
pub mod sites;

use thiserror::Error;

pub use schools::SchoolRegistry;
pub use sites::{GeocodeOptions, GeocodedSites, SiteRegistry};

/// Input validation failures. All of them abort the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two non-excluded site rows share an identifier.
    #[error("Duplicate site id {id}")]
    DuplicateSite {
        /// The repeated identifier.
        id: i64,
    },

    /// Two school rows share a `(year, ncessch)` key.
    #[error("Duplicate school {ncessch} for year {year}")]
    DuplicateSchool {
        /// Reporting year of the repeated key.
        year: i32,
        /// School identifier of the repeated key.
        ncessch: String,
    },
}
