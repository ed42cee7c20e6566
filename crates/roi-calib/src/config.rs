//! JSON configuration for the calibrator.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

fn default_settings_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_settings_name() -> String {
    "calibration.txt".to_string()
}

fn default_drag_handle_size() -> i32 {
    20
}

fn default_drag_capture_size() -> i32 {
    300
}

fn default_max_extent() -> i32 {
    16384
}

/// Calibrator settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibratorConfig {
    /// Directory holding the calibration record.
    #[serde(default = "default_settings_dir")]
    pub settings_dir: PathBuf,
    /// File name of the calibration record inside `settings_dir`.
    #[serde(default = "default_settings_name")]
    pub settings_name: String,
    /// Clamp dragged points to the visibility rectangle instead of the frame.
    #[serde(default)]
    pub limit_visibility: bool,
    /// Side of the square handle drawn around each point.
    #[serde(default = "default_drag_handle_size")]
    pub drag_handle_size: i32,
    /// Side of the capture square used while a handle is being dragged.
    ///
    /// Larger than the handle so fast pointer moves do not drop the drag.
    #[serde(default = "default_drag_capture_size")]
    pub drag_capture_size: i32,
    /// Largest width or height a rectangle may span before the record is
    /// rejected as corrupt.
    #[serde(default = "default_max_extent")]
    pub max_extent: i32,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            settings_dir: default_settings_dir(),
            settings_name: default_settings_name(),
            limit_visibility: false,
            drag_handle_size: default_drag_handle_size(),
            drag_capture_size: default_drag_capture_size(),
            max_extent: default_max_extent(),
        }
    }
}

impl CalibratorConfig {
    /// Default settings with the record stored under `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            settings_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Full path of the calibration record.
    pub fn calibration_path(&self) -> PathBuf {
        self.settings_dir.join(&self.settings_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: CalibratorConfig = serde_json::from_str(r#"{"limit_visibility": true}"#).unwrap();
        assert!(cfg.limit_visibility);
        assert_eq!(cfg.calibration_path(), Path::new("data").join("calibration.txt"));
        assert_eq!(cfg.drag_handle_size, 20);
        assert_eq!(cfg.drag_capture_size, 300);
        assert_eq!(cfg.max_extent, 16384);
    }

    #[test]
    fn in_dir_overrides_only_the_directory() {
        let cfg = CalibratorConfig::in_dir("/tmp/cam0");
        assert_eq!(cfg.calibration_path(), Path::new("/tmp/cam0/calibration.txt"));
        assert!(!cfg.limit_visibility);
    }
}
