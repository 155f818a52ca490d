//! Coordinate reference systems for boundary sets.
//!
//! School and site coordinates are WGS84 latitude/longitude. Before a
//! containment test they are projected into the boundary set's CRS.
//! Geographic CRSs based on WGS84 or NAD83 use longitude/latitude
//! directly (the datum shift is well under a meter). Web Mercator is
//! projected with the spherical Mercator formula.

use std::f64::consts::FRAC_PI_4;
use std::fmt;

use geo::Point;
use layoff_map_models::Coordinate;

use crate::SpatialError;

/// Radius of the Web Mercator sphere in meters.
const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Web Mercator is undefined at the poles; latitudes are clamped here.
const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Geographic CRSs whose axes are plain longitude/latitude degrees.
const GEOGRAPHIC_EPSG: &[u32] = &[
    4326, // WGS 84
    4269, // NAD83 (TIGER/Line)
    4152, // NAD83(HARN)
    6318, // NAD83(2011)
    4258, // ETRS89
];

const WEB_MERCATOR_EPSG: &[u32] = &[3857, 900_913];

/// A supported coordinate reference system, identified by EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Crs(u32);

impl Crs {
    /// WGS 84, the `GeoJSON` default.
    pub const WGS84: Self = Self(4326);
    /// NAD83, used by Census TIGER/Line files.
    pub const NAD83: Self = Self(4269);
    pub const WEB_MERCATOR: Self = Self(3857);

    /// Looks up a CRS by EPSG code.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnsupportedCrs`] if points cannot be
    /// projected into it.
    pub fn from_epsg(epsg: u32) -> Result<Self, SpatialError> {
        if GEOGRAPHIC_EPSG.contains(&epsg) {
            Ok(Self(epsg))
        } else if WEB_MERCATOR_EPSG.contains(&epsg) {
            Ok(Self::WEB_MERCATOR)
        } else {
            Err(SpatialError::UnsupportedCrs { epsg })
        }
    }

    /// Parses a CRS name from a `GeoJSON` `crs` member.
    ///
    /// Accepts `EPSG:4269`, `urn:ogc:def:crs:EPSG::4269`,
    /// `urn:ogc:def:crs:EPSG:6.3:4269`,
    /// `http://www.opengis.net/def/crs/EPSG/0/4269`, and the OGC `CRS84`
    /// forms (which are WGS 84 in longitude/latitude order).
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnknownCrs`] for names that do not carry an
    /// EPSG code, or [`SpatialError::UnsupportedCrs`] for codes that cannot
    /// be projected into.
    pub fn from_name(name: &str) -> Result<Self, SpatialError> {
        let upper = name.trim().to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Ok(Self::WGS84);
        }

        if !upper.contains("EPSG") {
            return Err(SpatialError::UnknownCrs {
                name: name.to_string(),
            });
        }

        let code = upper
            .rsplit([':', '/'])
            .next()
            .and_then(|tail| tail.parse::<u32>().ok())
            .ok_or_else(|| SpatialError::UnknownCrs {
                name: name.to_string(),
            })?;

        Self::from_epsg(code)
    }

    #[must_use]
    pub const fn epsg(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn is_geographic(self) -> bool {
        GEOGRAPHIC_EPSG.contains(&self.0)
    }

    /// Projects a WGS84 coordinate into this CRS as an `(x, y)` point.
    #[must_use]
    pub fn project(self, coordinate: Coordinate) -> Point<f64> {
        if self.is_geographic() {
            return Point::new(coordinate.longitude, coordinate.latitude);
        }

        let lat = coordinate
            .latitude
            .clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT)
            .to_radians();
        let x = WEB_MERCATOR_RADIUS * coordinate.longitude.to_radians();
        let y = WEB_MERCATOR_RADIUS * (FRAC_PI_4 + lat / 2.0).tan().ln();
        Point::new(x, y)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}
