#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Site × school cross join.
//!
//! Every non-excluded site is paired with every school-year, including
//! pairs whose years do not line up and pairs where a side has no
//! coordinate. Narrowing to the nearest site or applying a distance
//! threshold is left to the analysis that consumes the table.

use geo::{Distance as _, Geodesic, Point};
use layoff_map_models::{Coordinate, ProximityRecord, School, Site};
use thiserror::Error;

/// Meters in one international mile.
pub const METERS_PER_MILE: f64 = 1_609.344;

/// Errors from the cross join.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    /// The join produced a different number of rows than `sites × schools`.
    #[error("Cross join produced {actual} rows, expected {expected} ({sites} sites × {schools} schools)")]
    Cardinality {
        /// Number of sites.
        sites: usize,
        /// Number of schools.
        schools: usize,
        /// `sites × schools`.
        expected: usize,
        /// Rows actually produced.
        actual: usize,
    },

    /// `sites × schools` does not fit in memory addressing.
    #[error("Cross join of {sites} sites × {schools} schools is too large")]
    TooLarge {
        /// Number of sites.
        sites: usize,
        /// Number of schools.
        schools: usize,
    },
}

/// Ellipsoidal (WGS84) geodesic distance in miles.
#[must_use]
pub fn distance_miles(a: Coordinate, b: Coordinate) -> f64 {
    let a = Point::new(a.longitude, a.latitude);
    let b = Point::new(b.longitude, b.latitude);
    Geodesic.distance(a, b) / METERS_PER_MILE
}

/// Pairs every site with every school, site-major.
///
/// # Errors
///
/// Returns [`JoinError::Cardinality`] if the output row count is not
/// exactly `sites.len() * schools.len()`, or [`JoinError::TooLarge`] if
/// that product overflows.
pub fn cross_join(sites: &[Site], schools: &[School]) -> Result<Vec<ProximityRecord>, JoinError> {
    let expected = sites
        .len()
        .checked_mul(schools.len())
        .ok_or(JoinError::TooLarge {
            sites: sites.len(),
            schools: schools.len(),
        })?;

    log::info!(
        "Joining {} sites × {} schools ({expected} pairs)...",
        sites.len(),
        schools.len()
    );

    let mut records = Vec::with_capacity(expected);

    for site in sites {
        for school in schools {
            let distance = match (site.coordinate, school.coordinate) {
                (Some(a), Some(b)) => Some(distance_miles(a, b)),
                _ => None,
            };

            records.push(ProximityRecord {
                site_id: site.id,
                site_coordinate: site.coordinate,
                ncessch: school.ncessch.clone(),
                year: school.year,
                school_coordinate: school.coordinate,
                distance_miles: distance,
            });
        }
    }

    if records.len() != expected {
        return Err(JoinError::Cardinality {
            sites: sites.len(),
            schools: schools.len(),
            expected,
            actual: records.len(),
        });
    }

    Ok(records)
}
