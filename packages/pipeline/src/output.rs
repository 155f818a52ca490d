//! Flat CSV output.
//!
//! The enriched table uses the column names downstream analysis already
//! expects: `lat_wrn`/`lon_wrn` for the layoff site, `lat_ccd`/`lon_ccd`
//! for the school, `dist` in miles, and `GEOID` for the tract. Missing
//! values are written as empty fields. Floats use the shortest
//! round-trip representation, so identical inputs give byte-identical
//! files.
//!
//! The geocoded-site checkpoint keeps each site's full address (`loc`)
//! next to its coordinate. Reading it back yields `(address, coordinate)`
//! pairs suitable for seeding a [`layoff_map_geocoder::cache::CachedGeocoder`].

use std::io::{Read, Write};

use layoff_map_models::{Coordinate, EnrichedRecord, Site};
use serde::{Deserialize, Serialize};

/// Header of the enriched table, in column order.
pub const COLUMNS: [&str; 9] = [
    "id", "lat_wrn", "lon_wrn", "ncessch", "year", "lat_ccd", "lon_ccd", "dist", "GEOID",
];

/// Header of the geocoded-site checkpoint, in column order.
pub const SITE_COLUMNS: [&str; 8] = ["id", "address", "city", "state", "zip", "loc", "lat", "lon"];

#[derive(Serialize)]
struct OutputRow<'a> {
    id: i64,
    lat_wrn: Option<f64>,
    lon_wrn: Option<f64>,
    ncessch: &'a str,
    year: i32,
    lat_ccd: Option<f64>,
    lon_ccd: Option<f64>,
    dist: Option<f64>,
    geoid: Option<&'a str>,
}

impl<'a> From<&'a EnrichedRecord> for OutputRow<'a> {
    fn from(record: &'a EnrichedRecord) -> Self {
        Self {
            id: record.site_id,
            lat_wrn: record.site_coordinate.map(|c| c.latitude),
            lon_wrn: record.site_coordinate.map(|c| c.longitude),
            ncessch: &record.ncessch,
            year: record.year,
            lat_ccd: record.school_coordinate.map(|c| c.latitude),
            lon_ccd: record.school_coordinate.map(|c| c.longitude),
            dist: record.distance_miles,
            geoid: record.tract_geoid.as_deref(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SiteRow {
    id: i64,
    address: String,
    city: String,
    state: String,
    zip: String,
    loc: String,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Writes the enriched table, header first, rows in the given order.
///
/// # Errors
///
/// Returns [`csv::Error`] if writing fails.
pub fn write_csv<W: Write>(records: &[EnrichedRecord], output: W) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);

    writer.write_record(COLUMNS)?;
    for record in records {
        writer.serialize(OutputRow::from(record))?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes geocoded sites as a checkpoint, including unlocated ones.
///
/// # Errors
///
/// Returns [`csv::Error`] if writing fails.
pub fn write_sites_csv<W: Write>(sites: &[Site], output: W) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);

    writer.write_record(SITE_COLUMNS)?;
    for site in sites {
        writer.serialize(SiteRow {
            id: site.id,
            address: site.address.clone(),
            city: site.city.clone(),
            state: site.state.clone(),
            zip: site.zip.clone(),
            loc: site.full_address.clone(),
            lat: site.coordinate.map(|c| c.latitude),
            lon: site.coordinate.map(|c| c.longitude),
        })?;
    }
    writer.flush()?;

    Ok(())
}

/// Reads a checkpoint back as `(full address, coordinate)` pairs.
///
/// Sites that were not located are skipped so they get looked up again.
///
/// # Errors
///
/// Returns [`csv::Error`] on malformed CSV.
pub fn read_sites_checkpoint<R: Read>(input: R) -> Result<Vec<(String, Coordinate)>, csv::Error> {
    let mut reader = csv::Reader::from_reader(input);
    let mut located = Vec::new();

    for row in reader.deserialize() {
        let row: SiteRow = row?;
        if let Some(coordinate) = Coordinate::from_parts(row.lat, row.lon) {
            located.push((row.loc, coordinate));
        }
    }

    Ok(located)
}

#[cfg(test)]
mod tests {
    use layoff_map_models::ProximityRecord;

    use super::*;

    fn record(site: Option<Coordinate>, geoid: Option<&str>) -> EnrichedRecord {
        let school = Coordinate::new(44.25, -69.5);
        EnrichedRecord::new(
            ProximityRecord {
                site_id: 7,
                site_coordinate: site,
                ncessch: "230000100001".to_string(),
                year: 2020,
                school_coordinate: Some(school),
                distance_miles: site.map(|_| 1.5),
            },
            geoid.map(ToString::to_string),
        )
    }

    fn site(id: i64, coordinate: Option<Coordinate>) -> Site {
        Site {
            id,
            address: "100 Main St".to_string(),
            city: "Augusta".to_string(),
            state: "ME".to_string(),
            zip: "04330".to_string(),
            full_address: "100 Main St Augusta ME 04330".to_string(),
            coordinate,
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let records = vec![
            record(Some(Coordinate::new(44.5, -69.75)), Some("23011010100")),
            record(None, None),
        ];
        let mut out = Vec::new();
        write_csv(&records, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,lat_wrn,lon_wrn,ncessch,year,lat_ccd,lon_ccd,dist,GEOID");
        assert_eq!(lines[1], "7,44.5,-69.75,230000100001,2020,44.25,-69.5,1.5,23011010100");
        assert_eq!(lines[2], "7,,,230000100001,2020,44.25,-69.5,,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_table_still_has_header() {
        let mut out = Vec::new();
        write_csv(&[], &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "id,lat_wrn,lon_wrn,ncessch,year,lat_ccd,lon_ccd,dist,GEOID\n"
        );
    }

    #[test]
    fn checkpoint_replays_located_sites_only() {
        let sites = vec![site(1, Some(Coordinate::new(44.3, -69.8))), site(2, None)];
        let mut out = Vec::new();
        write_sites_csv(&sites, &mut out).unwrap();

        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.starts_with("id,address,city,state,zip,loc,lat,lon\n"));
        assert!(text.contains("2,100 Main St,Augusta,ME,04330,100 Main St Augusta ME 04330,,"));

        let located = read_sites_checkpoint(out.as_slice()).unwrap();
        assert_eq!(
            located,
            vec![(
                "100 Main St Augusta ME 04330".to_string(),
                Coordinate::new(44.3, -69.8)
            )]
        );
    }
}
