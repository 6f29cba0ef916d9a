//! Analyzer configuration
//!
//! Every field has a default, so a config file only needs the values it
//! overrides. Files are JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::detector::DetectorConfig;
use crate::error::{Result, RhythmError};
use crate::store::DEFAULT_RECORDS_FILE;

/// Sampling rate assumed when a recording does not state one (Hz)
pub const DEFAULT_SAMPLING_RATE_HZ: f64 = 1000.0;

/// Runtime configuration for the analyzer and CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Path of the patient record table
    pub records_path: PathBuf,
    /// Sampling rate of input waveforms (Hz)
    pub sampling_rate_hz: f64,
    /// Beat detector settings
    pub detector: DetectorConfig,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            records_path: PathBuf::from(DEFAULT_RECORDS_FILE),
            sampling_rate_hz: DEFAULT_SAMPLING_RATE_HZ,
            detector: DetectorConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sampling_rate_hz.is_finite() || self.sampling_rate_hz <= 0.0 {
            return Err(RhythmError::InvalidInput(format!(
                "sampling_rate_hz must be positive, got {}",
                self.sampling_rate_hz
            )));
        }
        if self.records_path.as_os_str().is_empty() {
            return Err(RhythmError::InvalidInput("records_path is empty".into()));
        }
        self.detector.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.records_path, PathBuf::from("patient_records.csv"));
        assert_eq!(config.sampling_rate_hz, 1000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            AnalyzerConfig::from_json(r#"{"sampling_rate_hz": 360, "detector": {"refractory_ms": 200}}"#)
                .unwrap();
        assert_eq!(config.sampling_rate_hz, 360.0);
        assert_eq!(config.detector.refractory_ms, 200.0);
        assert_eq!(config.detector.threshold_ratio, 0.5);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AnalyzerConfig::from_json(r#"{"sampling_rate_hz": 0}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = AnalyzerConfig::from_json(r#"{"detector": {"threshold_ratio": 0}}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rhythm.json");
        let config = AnalyzerConfig {
            records_path: dir.path().join("records.csv"),
            ..Default::default()
        };
        fs::write(&path, config.to_json().unwrap()).unwrap();

        assert_eq!(AnalyzerConfig::from_json_file(&path).unwrap(), config);
    }
}
