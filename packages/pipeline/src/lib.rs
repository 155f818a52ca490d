#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! End-to-end layoff site × school enrichment.
//!
//! [`run`] validates both inputs, checks that every school year has a
//! tract boundary set, geocodes each site once, pairs every site with
//! every school-year, and tags each pair with the school's census tract.
//! The result is a flat table sorted by `(site id, ncessch, year)` so two
//! runs over the same inputs produce identical output.

pub mod config;
pub mod input;
pub mod output;

use std::collections::BTreeMap;
use std::sync::Arc;

use layoff_map_geocoder::AddressGeocoder;
use layoff_map_geocoder::progress::ProgressCallback;
use layoff_map_models::{
    EnrichedRecord, PipelineSummary, School, SchoolRecord, Site, SiteRecord,
};
use layoff_map_proximity::{JoinError, cross_join};
use layoff_map_registry::{GeocodeOptions, RegistryError, SchoolRegistry, SiteRegistry};
use layoff_map_spatial::{BoundaryCatalog, SpatialError};
use thiserror::Error;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Duplicate site or school.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Boundary loading, CRS, or year coverage problem.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error(transparent)]
    Join(#[from] JoinError),

    /// CSV read or write failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The run configuration could not be read or parsed.
    #[error("Invalid config {path}: {message}")]
    Config {
        /// Config file path.
        path: String,
        /// What was wrong with it.
        message: String,
    },
}

/// Raw input rows for one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub sites: Vec<SiteRecord>,
    pub schools: Vec<SchoolRecord>,
}

/// The enriched table plus what it took to build it.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// One row per site × school-year, sorted by `(site id, ncessch, year)`.
    pub records: Vec<EnrichedRecord>,
    pub summary: PipelineSummary,
    /// Every non-excluded site with its geocoding outcome, ordered by id.
    pub geocoded_sites: Vec<Site>,
}

/// Tract GEOIDs keyed by `(year, ncessch)`.
pub type TractAssignments = BTreeMap<(i32, String), Option<String>>;

/// Resolves each school-year's tract once.
///
/// A school without coordinates gets `None` without a lookup.
///
/// # Errors
///
/// Returns [`SpatialError::YearNotCovered`] if a school's year has no
/// boundary set.
pub fn resolve_tracts(
    schools: &[School],
    catalog: &BoundaryCatalog,
) -> Result<TractAssignments, SpatialError> {
    let mut assignments = TractAssignments::new();

    for school in schools {
        let geoid = match school.coordinate {
            Some(coordinate) => catalog
                .resolve(school.year, coordinate)?
                .map(ToString::to_string),
            None => None,
        };

        if geoid.is_none() && school.coordinate.is_some() {
            log::debug!(
                "No tract contains school {} ({})",
                school.ncessch,
                school.year
            );
        }

        assignments.insert((school.year, school.ncessch.clone()), geoid);
    }

    Ok(assignments)
}

/// Runs the whole pipeline.
///
/// Validation happens before any lookup: a duplicate site id, a duplicate
/// school-year, or a school year without a boundary set fails the run
/// without calling `geocoder`. Geocoding failures never fail the run; they
/// leave the site's coordinate empty and are counted in the summary.
///
/// # Errors
///
/// Returns [`PipelineError`] for the validation failures above or if the
/// cross join does not produce `sites × schools` rows.
pub async fn run(
    inputs: PipelineInputs,
    geocoder: &dyn AddressGeocoder,
    catalog: &BoundaryCatalog,
    options: &GeocodeOptions,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<PipelineOutput, PipelineError> {
    let sites = SiteRegistry::load(inputs.sites)?;
    let schools = SchoolRegistry::load(inputs.schools)?;

    catalog.ensure_covers(schools.years())?;

    let geocoded = sites.geocode(geocoder, options, progress).await;
    let pairs = cross_join(&geocoded.sites, schools.schools())?;

    log::info!("Resolving tracts for {} school-years...", schools.len());
    let tracts = resolve_tracts(schools.schools(), catalog)?;
    let located_schools = schools
        .schools()
        .iter()
        .filter(|s| s.coordinate.is_some())
        .count();
    let unresolved_tracts =
        located_schools - tracts.values().filter(|geoid| geoid.is_some()).count();

    let mut records: Vec<EnrichedRecord> = pairs
        .into_iter()
        .map(|pair| {
            let geoid = tracts
                .get(&(pair.year, pair.ncessch.clone()))
                .cloned()
                .flatten();
            EnrichedRecord::new(pair, geoid)
        })
        .collect();

    records.sort_by(|a, b| {
        (a.site_id, a.ncessch.as_str(), a.year).cmp(&(b.site_id, b.ncessch.as_str(), b.year))
    });

    let summary = PipelineSummary {
        sites: geocoded.sites.len(),
        excluded_sites: geocoded.excluded,
        schools: schools.len(),
        rows: records.len(),
        unresolved_geocodes: geocoded.unresolved,
        failed_geocodes: geocoded.failed,
        unresolved_tracts,
    };

    log::info!(
        "Pipeline complete: {} rows ({} sites × {} schools), {} sites excluded, \
         {} geocodes not found, {} geocodes failed, {} school-years outside every tract",
        summary.rows,
        summary.sites,
        summary.schools,
        summary.excluded_sites,
        summary.unresolved_geocodes,
        summary.failed_geocodes,
        summary.unresolved_tracts
    );

    Ok(PipelineOutput {
        records,
        summary,
        geocoded_sites: geocoded.sites,
    })
}
