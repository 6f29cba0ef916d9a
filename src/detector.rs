//! Beat detection
//!
//! R-peak detection sits behind the `PeakDetector` trait so any detector can
//! be plugged into the analyzer. `AmplitudePeakDetector` is a plain
//! amplitude-threshold detector with a refractory period. It applies no
//! filtering and expects a reasonably clean single-lead signal.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RhythmError};

/// Produces ordered beat sample indices from a raw waveform
pub trait PeakDetector {
    /// Detect beats; returns strictly increasing sample indices
    fn detect_peaks(&self, waveform: &[f64], sampling_rate: f64) -> Result<Vec<usize>>;
}

/// Settings for the amplitude-threshold detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum spacing between two beats (ms)
    pub refractory_ms: f64,
    /// Detection threshold as a fraction of the signal's min-to-max range (0-1)
    pub threshold_ratio: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            refractory_ms: 250.0,
            threshold_ratio: 0.5,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.refractory_ms.is_finite() || self.refractory_ms < 0.0 {
            return Err(RhythmError::InvalidInput(format!(
                "refractory period must be a non-negative number of ms, got {}",
                self.refractory_ms
            )));
        }
        if !(self.threshold_ratio > 0.0 && self.threshold_ratio < 1.0) {
            return Err(RhythmError::InvalidInput(format!(
                "threshold ratio must lie in (0, 1), got {}",
                self.threshold_ratio
            )));
        }
        Ok(())
    }
}

/// Local maxima above an amplitude threshold, at most one per refractory window
#[derive(Debug, Clone, Default)]
pub struct AmplitudePeakDetector {
    config: DetectorConfig,
}

impl AmplitudePeakDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

impl PeakDetector for AmplitudePeakDetector {
    fn detect_peaks(&self, waveform: &[f64], sampling_rate: f64) -> Result<Vec<usize>> {
        self.config.validate()?;
        if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
            return Err(RhythmError::InvalidInput(format!(
                "sampling rate must be a positive number, got {sampling_rate}"
            )));
        }
        if let Some(index) = waveform.iter().position(|v| !v.is_finite()) {
            return Err(RhythmError::InvalidInput(format!(
                "waveform sample {index} is not a finite number"
            )));
        }
        if waveform.len() < 3 {
            return Ok(Vec::new());
        }

        let min = waveform.iter().copied().fold(f64::INFINITY, f64::min);
        let max = waveform.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max <= min {
            return Ok(Vec::new());
        }

        let threshold = min + self.config.threshold_ratio * (max - min);
        let refractory = ((self.config.refractory_ms / 1000.0) * sampling_rate).round() as usize;

        let mut peaks: Vec<usize> = Vec::new();
        for i in 1..waveform.len() - 1 {
            let value = waveform[i];
            let is_local_max = value > waveform[i - 1] && value >= waveform[i + 1];
            if !is_local_max || value < threshold {
                continue;
            }

            match peaks.last_mut() {
                Some(last) if i - *last <= refractory => {
                    // Keep the taller of two candidates inside one window
                    if value > waveform[*last] {
                        *last = i;
                    }
                }
                _ => peaks.push(i),
            }
        }

        debug!(
            samples = waveform.len(),
            sampling_rate,
            threshold,
            beats = peaks.len(),
            "detected beats"
        );
        Ok(peaks)
    }
}
