use crate::db::layer::{LayerId, MET1, MET2};
use crate::error::RouteError;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RouterConfig {
    #[serde(default = "default_global_grid_unit")]
    pub global_grid_unit: f64,
    #[serde(default = "default_detail_grid_unit")]
    pub detail_grid_unit: f64,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_layers_to_avoid")]
    pub layers_to_avoid: Vec<(u16, u16)>,
    #[serde(default = "default_detail_margin")]
    pub detail_margin: f64,
    #[serde(default = "default_bend_radius_cells")]
    pub bend_radius_cells: u32,
    #[serde(default)]
    pub add_segment_ports: bool,
    #[serde(default = "default_port_name_prefix")]
    pub port_name_prefix: String,
    #[serde(default = "default_true")]
    pub require_all: bool,
    #[serde(default = "default_true")]
    pub deterministic: bool,
    #[serde(default = "default_clearance")]
    pub clearance: f64,
    #[serde(default = "default_bbox_padding")]
    pub bbox_padding_um: f64,
    #[serde(default)]
    pub min_segment_um: Option<f64>,
    #[serde(default = "default_min_segment_length")]
    pub min_segment_length_um: f64,
    #[serde(default = "default_max_expansions")]
    pub max_expansions: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            global_grid_unit: default_global_grid_unit(),
            detail_grid_unit: default_detail_grid_unit(),
            width: default_width(),
            layers_to_avoid: default_layers_to_avoid(),
            detail_margin: default_detail_margin(),
            bend_radius_cells: default_bend_radius_cells(),
            add_segment_ports: false,
            port_name_prefix: default_port_name_prefix(),
            require_all: default_true(),
            deterministic: default_true(),
            clearance: default_clearance(),
            bbox_padding_um: default_bbox_padding(),
            min_segment_um: None,
            min_segment_length_um: default_min_segment_length(),
            max_expansions: default_max_expansions(),
        }
    }
}

impl RouterConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, RouteError> {
        let config: Self = toml::from_str(text).map_err(|e| RouteError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read router config {:?}", path))?;
        let config = Self::from_toml_str(&text)
            .with_context(|| format!("Failed to parse router config {:?}", path))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RouteError> {
        let positive = [
            ("global_grid_unit", self.global_grid_unit),
            ("detail_grid_unit", self.detail_grid_unit),
            ("width", self.width),
            ("min_segment_length_um", self.min_segment_length_um),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(RouteError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        let non_negative = [
            ("detail_margin", self.detail_margin),
            ("clearance", self.clearance),
            ("bbox_padding_um", self.bbox_padding_um),
            ("min_segment_um", self.min_segment_um.unwrap_or(0.0)),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(RouteError::InvalidConfig(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }
        if self.detail_grid_unit > self.global_grid_unit {
            return Err(RouteError::InvalidConfig(format!(
                "detail_grid_unit {} is coarser than global_grid_unit {}",
                self.detail_grid_unit, self.global_grid_unit
            )));
        }
        if self.bend_radius_cells == 0 {
            return Err(RouteError::InvalidConfig(
                "bend_radius_cells must be at least 1".to_string(),
            ));
        }
        if self.max_expansions == 0 {
            return Err(RouteError::InvalidConfig(
                "max_expansions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn avoid_layers(&self) -> Vec<LayerId> {
        self.layers_to_avoid.iter().map(|&l| LayerId::from(l)).collect()
    }

    /// Shortest segment the simplifier keeps without trying to merge it, in µm.
    pub fn min_segment(&self) -> f64 {
        self.min_segment_um
            .unwrap_or_else(|| (2.0 * self.detail_grid_unit).max(2.0 * self.width))
    }
}

fn default_global_grid_unit() -> f64 {
    2.0
}

fn default_detail_grid_unit() -> f64 {
    0.25
}

fn default_width() -> f64 {
    0.25
}

fn default_layers_to_avoid() -> Vec<(u16, u16)> {
    vec![
        (MET1.layer, MET1.datatype),
        (MET2.layer, MET2.datatype),
    ]
}

fn default_detail_margin() -> f64 {
    5.0
}

fn default_bend_radius_cells() -> u32 {
    1
}

fn default_port_name_prefix() -> String {
    "seg".to_string()
}

fn default_true() -> bool {
    true
}

fn default_clearance() -> f64 {
    0.25
}

fn default_bbox_padding() -> f64 {
    10.0
}

fn default_min_segment_length() -> f64 {
    0.01
}

fn default_max_expansions() -> u32 {
    2_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = RouterConfig::from_toml_str("").unwrap();
        assert_eq!(config, RouterConfig::default());
        assert_eq!(config.avoid_layers(), vec![MET1, MET2]);
        assert_eq!(config.min_segment(), 0.5);
    }

    #[test]
    fn overrides_are_read() {
        let config = RouterConfig::from_toml_str(
            "global_grid_unit = 1.0\nwidth = 0.5\nlayers_to_avoid = [[68, 20]]\nrequire_all = false\n",
        )
        .unwrap();
        assert_eq!(config.global_grid_unit, 1.0);
        assert_eq!(config.min_segment(), 1.0);
        assert_eq!(config.avoid_layers(), vec![MET1]);
        assert!(!config.require_all);
    }

    #[test]
    fn rejects_bad_values() {
        let negative = RouterConfig {
            width: -0.1,
            ..RouterConfig::default()
        };
        assert!(matches!(negative.validate(), Err(RouteError::InvalidConfig(_))));

        let inverted = RouterConfig {
            detail_grid_unit: 4.0,
            ..RouterConfig::default()
        };
        assert!(matches!(inverted.validate(), Err(RouteError::InvalidConfig(_))));

        assert!(matches!(
            RouterConfig::from_toml_str("width = \"wide\""),
            Err(RouteError::Config(_))
        ));
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.toml");
        std::fs::write(
            &path,
            "width = 0.3\nclearance = 0.2\nadd_segment_ports = true\nport_name_prefix = \"w\"\n",
        )
        .unwrap();

        let config = RouterConfig::load(&path).unwrap();
        assert_eq!(config.width, 0.3);
        assert_eq!(config.clearance, 0.2);
        assert!(config.add_segment_ports);
        assert_eq!(config.port_name_prefix, "w");
        assert_eq!(config.global_grid_unit, default_global_grid_unit());
    }

    #[test]
    fn load_reports_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = RouterConfig::load(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read router config"));
        assert!(err.downcast_ref::<RouteError>().is_none());

        let invalid = dir.path().join("invalid.toml");
        std::fs::write(&invalid, "bend_radius_cells = 0\n").unwrap();
        let err = RouterConfig::load(&invalid).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RouteError>(),
            Some(RouteError::InvalidConfig(_))
        ));
    }
}
