//! CSV readers for the two pipeline inputs.
//!
//! Sites use the WARN export columns `id,address,city,state,zip,excl`
//! (`excl` optional). Schools use the directory columns
//! `year,ncessch,latitude,longitude`, with blank coordinates read as
//! missing. Extra columns are ignored.

use std::io::Read;
use std::path::Path;

use layoff_map_models::{SchoolRecord, SiteRecord};

use crate::PipelineError;

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input)
}

/// Reads layoff site rows.
///
/// # Errors
///
/// Returns [`csv::Error`] on malformed CSV or a row that does not
/// deserialize (e.g. a non-numeric id).
pub fn read_sites<R: Read>(input: R) -> Result<Vec<SiteRecord>, csv::Error> {
    reader(input).deserialize().collect()
}

/// Reads school directory rows.
///
/// # Errors
///
/// Returns [`csv::Error`] on malformed CSV or a row that does not
/// deserialize.
pub fn read_schools<R: Read>(input: R) -> Result<Vec<SchoolRecord>, csv::Error> {
    reader(input).deserialize().collect()
}

/// Opens and reads a site CSV file.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be opened or parsed.
pub fn read_sites_path(path: &Path) -> Result<Vec<SiteRecord>, PipelineError> {
    let records = read_sites(std::fs::File::open(path)?)?;
    log::info!("Read {} site rows from {}", records.len(), path.display());
    Ok(records)
}

/// Opens and reads a school CSV file.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be opened or parsed.
pub fn read_schools_path(path: &Path) -> Result<Vec<SchoolRecord>, PipelineError> {
    let records = read_schools(std::fs::File::open(path)?)?;
    log::info!("Read {} school rows from {}", records.len(), path.display());
    Ok(records)
}
