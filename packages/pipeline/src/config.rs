//! Run configuration.
//!
//! ```toml
//! geoid_property = "GEOID"
//!
//! [geocoder]
//! user_agent = "layoff-map (research@example.org)"
//!
//! [[boundaries]]
//! path = "data/tl_2019_23_tract.geojson"
//! through = 2019
//!
//! [[boundaries]]
//! path = "data/tl_2020_23_tract.geojson"
//! from = 2020
//! ```
//!
//! Relative boundary paths are resolved against the config file's
//! directory. Geocoder fields left out fall back to the embedded service
//! defaults.

use std::path::{Path, PathBuf};

use layoff_map_geocoder::service_registry::GeocoderConfig;
use layoff_map_spatial::boundary::DEFAULT_GEOID_PROPERTY;
use layoff_map_spatial::{BoundaryCatalog, BoundaryEra, TractBoundarySet, YearRange};
use serde::Deserialize;

use crate::PipelineError;

/// One boundary file and the school years it covers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoundaryConfig {
    /// Display name; defaults to the file stem.
    #[serde(default)]
    pub name: Option<String>,
    /// `GeoJSON` feature collection of tract polygons.
    pub path: PathBuf,
    #[serde(flatten)]
    pub years: YearRange,
}

impl BoundaryConfig {
    fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map_or_else(|| self.path.display().to_string(), |s| s.to_string_lossy().into_owned())
        })
    }
}

fn default_geoid_property() -> String {
    DEFAULT_GEOID_PROPERTY.to_string()
}

/// Everything a run needs besides its two input tables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    /// Feature property holding the tract GEOID.
    #[serde(default = "default_geoid_property")]
    pub geoid_property: String,
    pub boundaries: Vec<BoundaryConfig>,
}

impl PipelineConfig {
    /// Parses a config from TOML text. `origin` names the source in errors.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the TOML is malformed or a
    /// required field is missing.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, PipelineError> {
        toml::de::from_str(text).map_err(|e| PipelineError::Config {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Reads a config file and resolves its boundary paths against the
    /// file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the file cannot be read or
    /// [`PipelineError::Config`] if it cannot be parsed.
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text, &path.display().to_string())?;

        if let Some(dir) = path.parent() {
            for boundary in &mut config.boundaries {
                if boundary.path.is_relative() {
                    boundary.path = dir.join(&boundary.path);
                }
            }
        }

        Ok(config)
    }

    /// Loads every boundary file and validates them as one catalog.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Spatial`] if a file cannot be read or
    /// parsed, or if the eras disagree on CRS or overlap.
    pub fn load_catalog(&self) -> Result<BoundaryCatalog, PipelineError> {
        let mut eras = Vec::with_capacity(self.boundaries.len());

        for boundary in &self.boundaries {
            let set = TractBoundarySet::from_path(
                boundary.display_name(),
                &boundary.path,
                &self.geoid_property,
            )?;
            eras.push(BoundaryEra::new(boundary.years, set));
        }

        Ok(BoundaryCatalog::new(eras)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[geocoder]
concurrent_requests = 2

[[boundaries]]
name = "tl_2019"
path = "tl_2019.geojson"
through = 2019

[[boundaries]]
path = "tl_2020.geojson"
from = 2020
"#;

    fn tract_file(geoid: &str) -> String {
        format!(
            r#"{{
  "type": "FeatureCollection",
  "crs": {{"type": "name", "properties": {{"name": "urn:ogc:def:crs:EPSG::4269"}}}},
  "features": [{{
    "type": "Feature",
    "properties": {{"GEOID": "{geoid}"}},
    "geometry": {{
      "type": "Polygon",
      "coordinates": [[[19.0, 9.0], [21.0, 9.0], [21.0, 11.0], [19.0, 11.0], [19.0, 9.0]]]
    }}
  }}]
}}"#
        )
    }

    #[test]
    fn parses_eras_and_defaults() {
        let config = PipelineConfig::from_toml(CONFIG, "test").unwrap();
        assert_eq!(config.geoid_property, "GEOID");
        assert_eq!(config.geocoder.concurrent_requests, 2);
        assert_eq!(
            config.geocoder.user_agent,
            GeocoderConfig::embedded().user_agent
        );
        assert_eq!(config.boundaries.len(), 2);
        assert_eq!(config.boundaries[0].years, YearRange::through(2019));
        assert_eq!(config.boundaries[1].years, YearRange::starting(2020));
        assert_eq!(config.boundaries[1].display_name(), "tl_2020");
    }

    #[test]
    fn missing_boundaries_is_an_error() {
        let err = PipelineConfig::from_toml("geoid_property = \"GEOID\"\n", "test").unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }

    #[test]
    fn loads_catalog_relative_to_config() {
        let dir = std::env::temp_dir().join(format!("layoff_map_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tl_2019.geojson"), tract_file("T-A")).unwrap();
        std::fs::write(dir.join("tl_2020.geojson"), tract_file("T-B")).unwrap();
        let config_path = dir.join("layoff_map.toml");
        std::fs::write(&config_path, CONFIG).unwrap();

        let config = PipelineConfig::from_path(&config_path).unwrap();
        let catalog = config.load_catalog().unwrap();

        let point = layoff_map_models::Coordinate::new(10.0, 20.0);
        assert_eq!(catalog.resolve(2019, point).unwrap(), Some("T-A"));
        assert_eq!(catalog.resolve(2020, point).unwrap(), Some("T-B"));
        assert_eq!(catalog.eras()[0].boundaries.name(), "tl_2019");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
