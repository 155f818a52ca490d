//! In-memory tract boundary set with an R-tree spatial index.
//!
//! Parses a `GeoJSON` feature collection of tract polygons once, builds an
//! R-tree over their envelopes, and answers point-in-polygon lookups.

use std::path::Path;

use geo::{BoundingRect, Contains, MultiPolygon};
use geojson::{FeatureCollection, GeoJson};
use layoff_map_models::Coordinate;
use rstar::{AABB, RTree, RTreeObject};

use crate::{Crs, SpatialError};

/// Default feature property holding the tract GEOID (TIGER/Line naming).
pub const DEFAULT_GEOID_PROPERTY: &str = "GEOID";

/// A tract polygon stored in the R-tree with its GEOID.
struct BoundaryEntry {
    geoid: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// One vintage of census tract polygons sharing a single CRS.
///
/// Immutable once built; lookups take `&self` so one set can serve any
/// number of readers.
pub struct TractBoundarySet {
    name: String,
    crs: Crs,
    tracts: RTree<BoundaryEntry>,
}

impl std::fmt::Debug for TractBoundarySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractBoundarySet")
            .field("name", &self.name)
            .field("crs", &self.crs)
            .field("tracts", &self.tracts.size())
            .finish()
    }
}

impl TractBoundarySet {
    /// Builds a set from already-parsed polygons.
    #[must_use]
    pub fn from_polygons<I>(name: impl Into<String>, crs: Crs, polygons: I) -> Self
    where
        I: IntoIterator<Item = (String, MultiPolygon<f64>)>,
    {
        let entries: Vec<BoundaryEntry> = polygons
            .into_iter()
            .map(|(geoid, polygon)| BoundaryEntry {
                geoid,
                envelope: compute_envelope(&polygon),
                polygon,
            })
            .collect();

        Self {
            name: name.into(),
            crs,
            tracts: RTree::bulk_load(entries),
        }
    }

    /// Parses a `GeoJSON` feature collection of tract polygons.
    ///
    /// The CRS comes from the legacy top-level `crs` member when present
    /// and defaults to WGS 84 otherwise. Features without a polygon
    /// geometry or without `geoid_property` are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::GeoJson`] if the text is not a feature
    /// collection, or a CRS error if the declared CRS is unknown or
    /// unsupported.
    pub fn from_geojson(
        name: impl Into<String>,
        geojson: &str,
        geoid_property: &str,
    ) -> Result<Self, SpatialError> {
        let name = name.into();
        let invalid = |message: String| SpatialError::GeoJson {
            name: name.clone(),
            message,
        };

        let parsed: GeoJson = geojson.parse().map_err(|e| invalid(format!("{e}")))?;
        let GeoJson::FeatureCollection(collection) = parsed else {
            return Err(invalid("expected a FeatureCollection".to_string()));
        };

        let crs = declared_crs(&collection)?;

        let mut polygons = Vec::with_capacity(collection.features.len());
        let mut skipped = 0usize;

        for (idx, feature) in collection.features.into_iter().enumerate() {
            let Some(geoid) = feature.property(geoid_property).and_then(geoid_string) else {
                log::warn!("{name}: feature {idx} has no '{geoid_property}' property");
                skipped += 1;
                continue;
            };

            let Some(polygon) = feature.geometry.and_then(geometry_to_multipolygon) else {
                log::warn!("{name}: failed to parse polygon geometry for tract {geoid}");
                skipped += 1;
                continue;
            };

            polygons.push((geoid, polygon));
        }

        let set = Self::from_polygons(name, crs, polygons);
        log::info!(
            "Loaded {} tracts into boundary set '{}' ({}, {skipped} skipped)",
            set.len(),
            set.name,
            set.crs
        );

        Ok(set)
    }

    /// Reads and parses a `GeoJSON` file. See [`Self::from_geojson`].
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Io`] if the file cannot be read, or any
    /// error from [`Self::from_geojson`].
    pub fn from_path(
        name: impl Into<String>,
        path: &Path,
        geoid_property: &str,
    ) -> Result<Self, SpatialError> {
        let text = std::fs::read_to_string(path).map_err(|source| SpatialError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_geojson(name, &text, geoid_property)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracts.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up the GEOID of the tract containing a WGS84 coordinate.
    ///
    /// Points on a polygon edge are not contained. If several polygons
    /// contain the point the smallest GEOID wins, so a given point and set
    /// always give the same answer.
    #[must_use]
    pub fn lookup(&self, coordinate: Coordinate) -> Option<&str> {
        let point = self.crs.project(coordinate);
        let query_env = AABB::from_point([point.x(), point.y()]);

        self.tracts
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .map(|entry| entry.geoid.as_str())
            .min()
    }
}

/// Reads the legacy `crs` member: `{"type": "name", "properties": {"name": ...}}`.
fn declared_crs(collection: &FeatureCollection) -> Result<Crs, SpatialError> {
    let name = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(serde_json::Value::as_str);

    name.map_or(Ok(Crs::WGS84), Crs::from_name)
}

/// GEOIDs are usually strings but some exports write them as numbers.
fn geoid_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn geometry_to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use geo::{LineString, Polygon};

    use super::*;

    /// Axis-aligned square in (x, y) = (lon, lat).
    fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (min_x, min_y),
                (max_x, min_y),
                (max_x, max_y),
                (min_x, max_y),
                (min_x, min_y),
            ]),
            vec![],
        )])
    }

    const TRACTS: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::4269" } },
        "features": [
            {
                "type": "Feature",
                "properties": { "GEOID": "23001010100" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-71, 44], [-70, 44], [-70, 45], [-71, 45], [-71, 44]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "GEOID": 23001010200 },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[-70, 44], [-69, 44], [-69, 45], [-70, 45], [-70, 44]]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "NAME": "no geoid" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-68, 44], [-67, 44], [-67, 45], [-68, 45], [-68, 44]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "GEOID": "23001010300" },
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn loads_feature_collection() {
        let set = TractBoundarySet::from_geojson("tl_2019", TRACTS, DEFAULT_GEOID_PROPERTY)
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.crs(), Crs::NAD83);
        assert_eq!(set.name(), "tl_2019");

        assert_eq!(
            set.lookup(Coordinate::new(44.5, -70.5)),
            Some("23001010100")
        );
        assert_eq!(
            set.lookup(Coordinate::new(44.5, -69.5)),
            Some("23001010200")
        );
        assert_eq!(set.lookup(Coordinate::new(44.5, -67.5)), None);
        assert_eq!(set.lookup(Coordinate::new(10.0, 20.0)), None);
    }

    #[test]
    fn defaults_to_wgs84_without_crs_member() {
        let json = r#"{"type": "FeatureCollection", "features": []}"#;
        let set = TractBoundarySet::from_geojson("empty", json, "GEOID").unwrap();
        assert_eq!(set.crs(), Crs::WGS84);
        assert!(set.is_empty());
    }

    #[test]
    fn rejects_non_collections() {
        let json = r#"{"type": "Point", "coordinates": [0, 0]}"#;
        assert!(matches!(
            TractBoundarySet::from_geojson("point", json, "GEOID"),
            Err(SpatialError::GeoJson { .. })
        ));
        assert!(matches!(
            TractBoundarySet::from_geojson("garbage", "not json", "GEOID"),
            Err(SpatialError::GeoJson { .. })
        ));
    }

    #[test]
    fn rejects_unsupported_crs() {
        let json = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "EPSG:26919" } },
            "features": []
        }"#;
        assert!(matches!(
            TractBoundarySet::from_geojson("utm", json, "GEOID"),
            Err(SpatialError::UnsupportedCrs { epsg: 26919 })
        ));
    }

    #[test]
    fn edge_points_are_consistent() {
        let set = TractBoundarySet::from_polygons(
            "pair",
            Crs::WGS84,
            vec![
                ("B".to_string(), square(1.0, 0.0, 2.0, 1.0)),
                ("A".to_string(), square(0.0, 0.0, 1.0, 1.0)),
            ],
        );
        let on_edge = Coordinate::new(0.5, 1.0);
        let first = set.lookup(on_edge).map(str::to_string);
        for _ in 0..10 {
            assert_eq!(set.lookup(on_edge).map(str::to_string), first);
        }
    }

    #[test]
    fn overlapping_polygons_resolve_to_smallest_geoid() {
        let set = TractBoundarySet::from_polygons(
            "overlap",
            Crs::WGS84,
            vec![
                ("T-2".to_string(), square(0.0, 0.0, 2.0, 2.0)),
                ("T-1".to_string(), square(0.5, 0.5, 1.5, 1.5)),
            ],
        );
        assert_eq!(set.lookup(Coordinate::new(1.0, 1.0)), Some("T-1"));
        assert_eq!(set.lookup(Coordinate::new(0.25, 0.25)), Some("T-2"));
    }

    #[test]
    fn projects_into_web_mercator() {
        // A square around (lat 0.5, lon 0.5) expressed in meters.
        let set = TractBoundarySet::from_polygons(
            "mercator",
            Crs::WEB_MERCATOR,
            vec![(
                "M".to_string(),
                square(0.0, 0.0, 111_319.5, 111_325.2),
            )],
        );
        assert_eq!(set.lookup(Coordinate::new(0.5, 0.5)), Some("M"));
        assert_eq!(set.lookup(Coordinate::new(0.5, 1.5)), None);
    }
}
