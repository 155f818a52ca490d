#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Census tract attribution for school locations.
//!
//! Tract boundaries are redrawn between census vintages, so a school is
//! matched against the boundary set that was in force for its reporting
//! year. Each [`TractBoundarySet`] is loaded once from `GeoJSON`, indexed
//! with an R-tree, and shared read-only by every lookup. A
//! [`BoundaryCatalog`] maps year ranges to boundary sets and refuses sets
//! that disagree on coordinate reference system.

pub mod boundary;
pub mod catalog;
pub mod crs;

use thiserror::Error;

pub use boundary::TractBoundarySet;
pub use catalog::{BoundaryCatalog, BoundaryEra, YearRange};
pub use crs::Crs;

/// Errors from loading boundaries or resolving tracts.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Reading a boundary file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The boundary file is not a usable `GeoJSON` feature collection.
    #[error("Invalid GeoJSON in boundary set '{name}': {message}")]
    GeoJson {
        /// Boundary set name.
        name: String,
        /// Description of the problem.
        message: String,
    },

    /// The CRS name could not be understood.
    #[error("Unrecognized coordinate reference system: {name}")]
    UnknownCrs {
        /// Name as it appeared in the file.
        name: String,
    },

    /// The CRS is understood but points cannot be projected into it.
    #[error("Unsupported coordinate reference system: EPSG:{epsg}")]
    UnsupportedCrs {
        /// EPSG code.
        epsg: u32,
    },

    /// Two boundary sets in one catalog use different CRSs.
    #[error(
        "Boundary set '{found_set}' uses {found} but '{expected_set}' uses {expected}; \
         all boundary sets must share one coordinate reference system"
    )]
    CrsMismatch {
        /// Set whose CRS the catalog adopted.
        expected_set: String,
        /// The adopted CRS.
        expected: Crs,
        /// Set with the differing CRS.
        found_set: String,
        /// The differing CRS.
        found: Crs,
    },

    /// Two eras claim the same year.
    #[error("Boundary eras {first} and {second} overlap")]
    OverlappingEras {
        /// First overlapping range.
        first: YearRange,
        /// Second overlapping range.
        second: YearRange,
    },

    /// A year range whose start is after its end.
    #[error("Invalid year range {range}")]
    InvalidYearRange {
        /// The offending range.
        range: YearRange,
    },

    /// A catalog was built without any boundary sets.
    #[error("No boundary sets configured")]
    NoBoundaries,

    /// No era covers a school's reporting year.
    #[error("No boundary set covers year {year}")]
    YearNotCovered {
        /// The uncovered year.
        year: i32,
    },
}
