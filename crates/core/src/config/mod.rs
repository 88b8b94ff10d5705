use std::{path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{analysis, CalibrationOffset, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub meter: MeterConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&contents)?;
        tracing::debug!(?path, "loaded configuration");
        Ok(config)
    }

    /// Loads `path` when given, otherwise falls back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Configuration specific to the live meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub calibration_offset_db: i32,
    pub frame_interval_ms: u64,
    pub fft_size: usize,
    pub smoothing: f32,
}

impl MeterConfig {
    /// Offset clamped into its legal range. Out of range values are logged.
    pub fn calibration(&self) -> CalibrationOffset {
        if CalibrationOffset::is_out_of_range(self.calibration_offset_db) {
            tracing::warn!(
                requested = self.calibration_offset_db,
                "calibration offset outside [-20, 20], clamping"
            );
        }
        CalibrationOffset::new(self.calibration_offset_db)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            calibration_offset_db: 0,
            frame_interval_ms: 16,
            fft_size: analysis::DEFAULT_FFT_SIZE,
            smoothing: analysis::DEFAULT_SMOOTHING,
        }
    }
}

/// Where persisted state lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("hearing-meter-data.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_fill_in_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "meter": { "calibration_offset_db": 35 } }"#).unwrap();

        assert_eq!(config.meter.calibration().db(), 20);
        assert_eq!(config.meter.fft_size, 2048);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "meter": { "frame_interval_ms": 0 } }"#).unwrap();

        let config = AppConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.meter.frame_interval(), Duration::from_millis(1));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, crate::MeterError::Io(_)));
    }
}
