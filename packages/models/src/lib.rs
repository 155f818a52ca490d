#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record types shared across the layoff map pipeline.
//!
//! Layoff sites come from WARN notices and carry a free-text address that
//! still has to be geocoded. Schools come from the Common Core of Data
//! directory and already carry coordinates for each reporting year. The
//! pipeline pairs every site with every school and annotates each pair
//! with a distance and the school's census tract.

use serde::{Deserialize, Deserializer, Serialize};

/// A WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Builds a coordinate from optional parts. Both must be present and
    /// finite.
    #[must_use]
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(Self::new(lat, lon))
            }
            _ => None,
        }
    }
}

/// A layoff site row as it arrives from the WARN spreadsheet export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    /// Notice identifier. Unique among non-excluded rows.
    pub id: i64,
    /// Street address of the affected site.
    pub address: String,
    pub city: String,
    /// Two-letter state abbreviation.
    pub state: String,
    /// ZIP code, kept as text so leading zeros survive.
    pub zip: String,
    /// Rows flagged `1` in the `excl` column are dropped before any join.
    #[serde(rename = "excl", default, deserialize_with = "deserialize_flag")]
    pub excluded: bool,
}

/// A validated layoff site with its geocoding outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: i64,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    /// Street, city, state, and ZIP joined by single spaces.
    pub full_address: String,
    /// `None` until geocoded, and after a lookup that found nothing or
    /// failed.
    pub coordinate: Option<Coordinate>,
}

/// A school directory row for one reporting year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolRecord {
    /// Reporting (school) year.
    pub year: i32,
    /// NCES school identifier.
    pub ncessch: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// A school location for one reporting year, keyed by `(year, ncessch)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub year: i32,
    pub ncessch: String,
    /// Directory coordinates, taken as authoritative.
    pub coordinate: Option<Coordinate>,
}

impl From<SchoolRecord> for School {
    fn from(record: SchoolRecord) -> Self {
        Self {
            year: record.year,
            ncessch: record.ncessch,
            coordinate: Coordinate::from_parts(record.latitude, record.longitude),
        }
    }
}

/// One site × school pairing with its great-circle distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityRecord {
    pub site_id: i64,
    pub site_coordinate: Option<Coordinate>,
    pub ncessch: String,
    pub year: i32,
    pub school_coordinate: Option<Coordinate>,
    /// Distance in miles; `None` when either side has no coordinate.
    pub distance_miles: Option<f64>,
}

/// A [`ProximityRecord`] annotated with the school's census tract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedRecord {
    pub site_id: i64,
    pub site_coordinate: Option<Coordinate>,
    pub ncessch: String,
    pub year: i32,
    pub school_coordinate: Option<Coordinate>,
    pub distance_miles: Option<f64>,
    /// Tract GEOID, or `None` when no tract polygon encloses the school.
    pub tract_geoid: Option<String>,
}

impl EnrichedRecord {
    #[must_use]
    pub fn new(record: ProximityRecord, tract_geoid: Option<String>) -> Self {
        Self {
            site_id: record.site_id,
            site_coordinate: record.site_coordinate,
            ncessch: record.ncessch,
            year: record.year,
            school_coordinate: record.school_coordinate,
            distance_miles: record.distance_miles,
            tract_geoid,
        }
    }
}

/// Coverage counts reported at the end of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    /// Non-excluded sites that entered the join.
    pub sites: usize,
    /// Sites dropped by the exclusion flag.
    pub excluded_sites: usize,
    pub schools: usize,
    /// Rows in the enriched table (`sites × schools`).
    pub rows: usize,
    /// Sites whose lookup returned no candidates.
    pub unresolved_geocodes: usize,
    /// Sites whose lookup still failed after every retry.
    pub failed_geocodes: usize,
    /// Distinct school-years with no enclosing tract polygon.
    pub unresolved_tracts: usize,
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, or blank (false).
///
/// # Errors
///
/// Returns a deserialization error for any other value.
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "0.0" | "false" | "no" | "n" => Ok(false),
        "1" | "1.0" | "true" | "yes" | "y" => Ok(true),
        other => Err(serde::de::Error::custom(format!(
            "invalid exclusion flag: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_from_parts_requires_both() {
        assert_eq!(
            Coordinate::from_parts(Some(1.0), Some(2.0)),
            Some(Coordinate::new(1.0, 2.0))
        );
        assert_eq!(Coordinate::from_parts(Some(1.0), None), None);
        assert_eq!(Coordinate::from_parts(None, Some(2.0)), None);
        assert_eq!(Coordinate::from_parts(Some(f64::NAN), Some(2.0)), None);
    }

    #[test]
    fn site_record_reads_exclusion_flag() {
        let json = r#"{"id":7,"address":"1 Elm St","city":"Bangor","state":"ME","zip":"04401","excl":"1"}"#;
        let record: SiteRecord = serde_json::from_str(json).unwrap();
        assert!(record.excluded);
        assert_eq!(record.zip, "04401");

        let json = r#"{"id":8,"address":"1 Elm St","city":"Bangor","state":"ME","zip":"04401","excl":""}"#;
        let record: SiteRecord = serde_json::from_str(json).unwrap();
        assert!(!record.excluded);
    }

    #[test]
    fn site_record_rejects_garbage_flag() {
        let json = r#"{"id":7,"address":"a","city":"b","state":"c","zip":"d","excl":"maybe"}"#;
        assert!(serde_json::from_str::<SiteRecord>(json).is_err());
    }

    #[test]
    fn school_record_without_coordinates() {
        let record = SchoolRecord {
            year: 2021,
            ncessch: "230000100001".to_string(),
            latitude: None,
            longitude: Some(-70.0),
        };
        let school = School::from(record);
        assert_eq!(school.coordinate, None);
        assert_eq!(school.year, 2021);
    }

    #[test]
    fn enriched_record_keeps_proximity_fields() {
        let proximity = ProximityRecord {
            site_id: 1,
            site_coordinate: Some(Coordinate::new(10.0, 20.0)),
            ncessch: "A".to_string(),
            year: 2021,
            school_coordinate: Some(Coordinate::new(10.0, 20.0)),
            distance_miles: Some(0.0),
        };
        let enriched = EnrichedRecord::new(proximity, Some("T-A".to_string()));
        assert_eq!(enriched.site_id, 1);
        assert_eq!(enriched.distance_miles, Some(0.0));
        assert_eq!(enriched.tract_geoid.as_deref(), Some("T-A"));
    }
}
