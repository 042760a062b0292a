use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PARK_AZIMUTH: f64 = 90.0;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DomeConfig {
    #[serde(default)]
    pub home_azimuth_deg: f64,
    #[serde(default = "DomeConfig::default_park_azimuth")]
    pub park_azimuth_deg: f64,
    #[serde(default = "DomeConfig::default_park_controls_shutter")]
    pub park_controls_shutter: bool,
    #[serde(default = "DomeConfig::default_azimuth_tolerance")]
    pub azimuth_tolerance_deg: f64,
    #[serde(default = "DomeConfig::default_derotate_deadband")]
    pub derotate_deadband: u32,
    #[serde(default = "DomeConfig::default_sensor_poll_ticks")]
    pub sensor_poll_ticks: u32,
    #[serde(default = "DomeConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub inertia_table: Option<PathBuf>,
}

impl Default for DomeConfig {
    fn default() -> Self {
        DomeConfig {
            home_azimuth_deg: 0.0,
            park_azimuth_deg: Self::default_park_azimuth(),
            park_controls_shutter: Self::default_park_controls_shutter(),
            azimuth_tolerance_deg: Self::default_azimuth_tolerance(),
            derotate_deadband: Self::default_derotate_deadband(),
            sensor_poll_ticks: Self::default_sensor_poll_ticks(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            inertia_table: None,
        }
    }
}

impl DomeConfig {
    fn default_park_azimuth() -> f64 {
        DEFAULT_PARK_AZIMUTH
    }
    fn default_park_controls_shutter() -> bool {
        true
    }
    fn default_azimuth_tolerance() -> f64 {
        1.0
    }
    fn default_derotate_deadband() -> u32 {
        100
    }
    fn default_sensor_poll_ticks() -> u32 {
        10
    }
    fn default_poll_interval_ms() -> u64 {
        1000
    }

    pub fn from_toml(txt: &str) -> Result<Self> {
        let mut cfg: DomeConfig = toml::from_str(txt)?;
        if cfg.sensor_poll_ticks == 0 {
            cfg.sensor_poll_ticks = Self::default_sensor_poll_ticks();
        }
        if cfg.poll_interval_ms == 0 {
            cfg.poll_interval_ms = Self::default_poll_interval_ms();
        }
        if cfg.azimuth_tolerance_deg <= 0.0 {
            cfg.azimuth_tolerance_deg = Self::default_azimuth_tolerance();
        }
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let txt = fs::read_to_string(path)?;
            Self::from_toml(&txt)
        } else {
            log::info!("No config at {}; using defaults.", path.display());
            Ok(DomeConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(DomeConfig::from_toml("").unwrap(), DomeConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let cfg = DomeConfig::load(Path::new("/nonexistent/scopedome.toml")).unwrap();

        assert_eq!(cfg.park_azimuth_deg, 90.0);
        assert!(cfg.park_controls_shutter);
        assert_eq!(cfg.derotate_deadband, 100);
        assert_eq!(cfg.inertia_table, None);
    }

    #[test]
    fn test_partial_file() {
        let cfg = DomeConfig::from_toml(
            r#"
home_azimuth_deg = 12.5
park_controls_shutter = false
sensor_poll_ticks = 0
inertia_table = "/etc/scopedome/inertia.csv"
"#,
        )
        .unwrap();

        assert_eq!(cfg.home_azimuth_deg, 12.5);
        assert!(!cfg.park_controls_shutter);
        assert_eq!(cfg.sensor_poll_ticks, 10);
        assert_eq!(cfg.azimuth_tolerance_deg, 1.0);
        assert_eq!(
            cfg.inertia_table,
            Some(PathBuf::from("/etc/scopedome/inertia.csv"))
        );
    }

    #[test]
    fn test_bad_value_is_error() {
        assert!(DomeConfig::from_toml("park_azimuth_deg = \"north\"").is_err());
    }
}
