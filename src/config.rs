//! Configuration loading from TOML files.
//!
//! A configuration file holds the anchor list plus optional `[placement]` and `[session]`
//! tables; every field of the optional tables has a default. See `config/neighborhood.toml`
//! for a complete example.

use crate::anchors::{AnchorRecord, AnchorRegistry, RegistryError};
use crate::placement::PlacementParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// A fixed-bearing marker shown relative to north regardless of GPS, eg "a tree one unit
/// south of wherever you stand".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    #[serde(default = "default_marker_bearing")]
    pub bearing_degrees: f64,
    #[serde(default = "default_marker_distance")]
    pub distance_units: f64,
}

fn default_marker_bearing() -> f64 {
    180.
}

fn default_marker_distance() -> f64 {
    1.
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            bearing_degrees: default_marker_bearing(),
            distance_units: default_marker_distance(),
        }
    }
}

/// Session timings, info-surface text, and which optional stages of the pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How often the nearest-anchor status line refreshes.
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: f64,
    /// Anchors further than this are never reported as "nearest".
    #[serde(default = "default_nearest_within")]
    pub nearest_within_meters: f64,
    /// When off, orientation samples are ignored and the heading stays north.
    #[serde(default = "default_true")]
    pub orientation_tracking: bool,
    /// When off, no geo-anchored objects are placed (eg, a marker-only demo).
    #[serde(default = "default_true")]
    pub anchor_placement: bool,
    #[serde(default)]
    pub marker: Option<MarkerConfig>,
    /// Appended as a final paragraph to the text shown for a tapped anchor.
    #[serde(default)]
    pub info_sign_off: Option<String>,
    /// Prefix of the "how many anchors are set up" line.
    #[serde(default = "default_count_label")]
    pub count_label: String,
}

fn default_status_interval() -> f64 {
    2.
}

fn default_nearest_within() -> f64 {
    1000.
}

fn default_count_label() -> String {
    "Anchors in neighborhood".to_owned()
}

fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            status_interval_secs: default_status_interval(),
            nearest_within_meters: default_nearest_within(),
            orientation_tracking: true,
            anchor_placement: true,
            marker: None,
            info_sign_off: None,
            count_label: default_count_label(),
        }
    }
}

/// Everything a session needs from disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub placement: PlacementParams,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub anchors: Vec<AnchorRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            anchors = config.anchors.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parses and validates TOML configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks everything that deserializing alone cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.placement.check().map_err(ConfigError::Invalid)?;

        let session = &self.session;
        if !(session.status_interval_secs.is_finite() && session.status_interval_secs > 0.) {
            return Err(ConfigError::Invalid("status_interval_secs must be positive"));
        }
        if !(session.nearest_within_meters >= 0.) {
            return Err(ConfigError::Invalid("nearest_within_meters must not be negative"));
        }
        if let Some(marker) = session.marker {
            if !(marker.bearing_degrees.is_finite() && marker.distance_units.is_finite()) {
                return Err(ConfigError::Invalid("marker values must be finite"));
            }
        }
        Ok(())
    }

    /// Builds the anchor registry described by this configuration.
    pub fn registry(&self) -> Result<AnchorRegistry, ConfigError> {
        Ok(AnchorRegistry::from_records(self.anchors.iter().cloned())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::{AnchorKind, Scale};
    use std::io::Write;

    const NEIGHBORHOOD: &str = r##"
[placement]
cap_units = 8.0

[session]
status_interval_secs = 5
orientation_tracking = false

[session.marker]
distance_units = 2.0

[[anchors]]
id = "tree-1"
latitude = 0.0
longitude = 0.0
kind = "tree"
scale = "10 10 10"
name = "Giant Christmas Tree"
color = "#0f0"

[[anchors]]
id = "star-1"
latitude = -0.0001
longitude = -0.0001
kind = "star"
scale = [2, 2, 2]
name = "Christmas Star"
color = "#ffd700"
"##;

    #[test]
    fn parses_full_file() {
        let config = Config::from_toml_str(NEIGHBORHOOD).unwrap();

        assert_eq!(config.placement.cap_units, 8.);
        assert_eq!(config.placement.distance_divisor, 10.);
        assert_eq!(config.session.status_interval_secs, 5.);
        assert!(!config.session.orientation_tracking);
        assert!(config.session.anchor_placement);
        assert_eq!(
            config.session.marker,
            Some(MarkerConfig {
                bearing_degrees: 180.,
                distance_units: 2.
            })
        );

        assert_eq!(config.anchors.len(), 2);
        assert_eq!(config.anchors[0].scale, Scale::uniform(10.));
        assert_eq!(config.anchors[1].kind, AnchorKind::Star);
        assert_eq!(config.anchors[1].color.rgb(), 0xffd700);

        let registry = config.registry().unwrap();
        assert_eq!(registry.placeable().len(), 2);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.session.status_interval_secs, 2.);
        assert_eq!(config.session.nearest_within_meters, 1000.);
        assert!(config.session.marker.is_none());
        assert!(config.session.info_sign_off.is_none());
        assert_eq!(config.session.count_label, "Anchors in neighborhood");
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let err = Config::from_toml_str(
            r#"
[[anchors]]
id = "x"
latitude = 1.0
longitude = 1.0
kind = "reindeer"
name = "Rudolph"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err:?}");
    }

    #[test]
    fn bad_scale_is_a_parse_error() {
        let err = Config::from_toml_str(
            r#"
[[anchors]]
id = "x"
latitude = 1.0
longitude = 1.0
kind = "tree"
scale = "big"
name = "Tree"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err:?}");
    }

    #[test]
    fn invalid_placement_params() {
        let err = Config::from_toml_str("[placement]\ndistance_divisor = 0.0\n").unwrap_err();
        insta::assert_snapshot!(err, @"invalid config: distance_divisor must be positive");
    }

    #[test]
    fn invalid_session_interval() {
        let err = Config::from_toml_str("[session]\nstatus_interval_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn duplicate_ids_surface_from_registry() {
        let config = Config::from_toml_str(
            r#"
[[anchors]]
id = "x"
latitude = 1.0
longitude = 1.0
kind = "tree"
name = "A"

[[anchors]]
id = "x"
latitude = 2.0
longitude = 2.0
kind = "tree"
name = "B"
"#,
        )
        .unwrap();
        assert!(matches!(
            config.registry(),
            Err(ConfigError::Registry(RegistryError::DuplicateId(_)))
        ));
    }

    #[test]
    fn load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(NEIGHBORHOOD.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.anchors[0].name, "Giant Christmas Tree");
    }

    #[test]
    fn missing_file() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
