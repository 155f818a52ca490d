//! Year-versioned catalog of tract boundary sets.
//!
//! Each era pairs an inclusive year range with the boundary set in force
//! during those years. Eras may not overlap, so every school year maps to
//! at most one set. A typical configuration splits at a decennial census:
//!
//! ```ignore
//! let catalog = BoundaryCatalog::split_at(2020, tracts_2019, tracts_2020)?;
//! assert_eq!(catalog.set_for_year(2019).unwrap().name(), "tl_2019");
//! ```

use std::fmt;

use layoff_map_models::Coordinate;
use serde::Deserialize;

use crate::{Crs, SpatialError, TractBoundarySet};

/// An inclusive range of reporting years; `None` leaves that end open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct YearRange {
    /// First covered year.
    #[serde(default)]
    pub from: Option<i32>,
    /// Last covered year.
    #[serde(default)]
    pub through: Option<i32>,
}

impl YearRange {
    #[must_use]
    pub const fn new(from: Option<i32>, through: Option<i32>) -> Self {
        Self { from, through }
    }

    /// Every year.
    #[must_use]
    pub const fn all() -> Self {
        Self::new(None, None)
    }

    /// Every year up to and including `year`.
    #[must_use]
    pub const fn through(year: i32) -> Self {
        Self::new(None, Some(year))
    }

    /// Every year from `year` on.
    #[must_use]
    pub const fn starting(year: i32) -> Self {
        Self::new(Some(year), None)
    }

    const fn lower(self) -> i32 {
        match self.from {
            Some(y) => y,
            None => i32::MIN,
        }
    }

    const fn upper(self) -> i32 {
        match self.through {
            Some(y) => y,
            None => i32::MAX,
        }
    }

    #[must_use]
    pub const fn contains(self, year: i32) -> bool {
        self.lower() <= year && year <= self.upper()
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.lower() <= self.upper()
    }

    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        self.lower() <= other.upper() && other.lower() <= self.upper()
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.from, self.through) {
            (None, None) => write!(f, "all years"),
            (Some(from), None) => write!(f, "{from}.."),
            (None, Some(through)) => write!(f, "..={through}"),
            (Some(from), Some(through)) => write!(f, "{from}..={through}"),
        }
    }
}

/// A boundary set and the years it applies to.
#[derive(Debug)]
pub struct BoundaryEra {
    pub years: YearRange,
    pub boundaries: TractBoundarySet,
}

impl BoundaryEra {
    #[must_use]
    pub const fn new(years: YearRange, boundaries: TractBoundarySet) -> Self {
        Self { years, boundaries }
    }
}

/// Non-overlapping boundary eras sharing one CRS, ordered by start year.
#[derive(Debug)]
pub struct BoundaryCatalog {
    eras: Vec<BoundaryEra>,
    crs: Crs,
}

impl BoundaryCatalog {
    /// Validates and orders the eras.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::NoBoundaries`] for an empty list,
    /// [`SpatialError::CrsMismatch`] if any set's CRS differs from the
    /// first set's, [`SpatialError::InvalidYearRange`] for a backwards
    /// range, or [`SpatialError::OverlappingEras`] if two ranges share a
    /// year.
    pub fn new(mut eras: Vec<BoundaryEra>) -> Result<Self, SpatialError> {
        let Some(first) = eras.first() else {
            return Err(SpatialError::NoBoundaries);
        };

        let crs = first.boundaries.crs();
        let expected_set = first.boundaries.name().to_string();

        for era in &eras {
            if era.boundaries.crs() != crs {
                return Err(SpatialError::CrsMismatch {
                    expected_set,
                    expected: crs,
                    found_set: era.boundaries.name().to_string(),
                    found: era.boundaries.crs(),
                });
            }
            if !era.years.is_valid() {
                return Err(SpatialError::InvalidYearRange { range: era.years });
            }
        }

        eras.sort_by_key(|era| era.years.lower());

        for pair in eras.windows(2) {
            if pair[0].years.overlaps(pair[1].years) {
                return Err(SpatialError::OverlappingEras {
                    first: pair[0].years,
                    second: pair[1].years,
                });
            }
        }

        for era in &eras {
            log::info!(
                "Boundary era {}: '{}' ({} tracts)",
                era.years,
                era.boundaries.name(),
                era.boundaries.len()
            );
        }

        Ok(Self { eras, crs })
    }

    /// One boundary set for every year.
    #[must_use]
    pub fn single(boundaries: TractBoundarySet) -> Self {
        let crs = boundaries.crs();
        Self {
            eras: vec![BoundaryEra::new(YearRange::all(), boundaries)],
            crs,
        }
    }

    /// `before` serves years up to `cutoff - 1`, `after` serves `cutoff` on.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::CrsMismatch`] if the two sets disagree on
    /// CRS, or [`SpatialError::InvalidYearRange`] if no year precedes
    /// `cutoff`.
    pub fn split_at(
        cutoff: i32,
        before: TractBoundarySet,
        after: TractBoundarySet,
    ) -> Result<Self, SpatialError> {
        let last_before = cutoff
            .checked_sub(1)
            .ok_or(SpatialError::InvalidYearRange {
                range: YearRange::new(None, Some(cutoff)),
            })?;

        Self::new(vec![
            BoundaryEra::new(YearRange::through(last_before), before),
            BoundaryEra::new(YearRange::starting(cutoff), after),
        ])
    }

    /// The CRS shared by every set.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    #[must_use]
    pub fn eras(&self) -> &[BoundaryEra] {
        &self.eras
    }

    /// The boundary set in force for `year`.
    #[must_use]
    pub fn set_for_year(&self, year: i32) -> Option<&TractBoundarySet> {
        self.eras
            .iter()
            .find(|era| era.years.contains(year))
            .map(|era| &era.boundaries)
    }

    /// Checks that every year has a boundary set.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::YearNotCovered`] for the first uncovered year.
    pub fn ensure_covers<I>(&self, years: I) -> Result<(), SpatialError>
    where
        I: IntoIterator<Item = i32>,
    {
        for year in years {
            if self.set_for_year(year).is_none() {
                return Err(SpatialError::YearNotCovered { year });
            }
        }
        Ok(())
    }

    /// Resolves the tract containing `coordinate` for a school in `year`.
    ///
    /// `Ok(None)` means the year has a boundary set but no polygon in it
    /// contains the point.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::YearNotCovered`] if no era covers `year`.
    pub fn resolve(&self, year: i32, coordinate: Coordinate) -> Result<Option<&str>, SpatialError> {
        let set = self
            .set_for_year(year)
            .ok_or(SpatialError::YearNotCovered { year })?;
        Ok(set.lookup(coordinate))
    }
}
