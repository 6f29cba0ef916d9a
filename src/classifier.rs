//! Rhythm classification
//!
//! Derives RR intervals and instantaneous heart rates from detected beat
//! positions, then scores the share of bradycardic, tachycardic and
//! statistically irregular beats against age-adjusted limits.

use tracing::debug;

use crate::error::{Result, RhythmError};
use crate::thresholds::AgeThresholdTable;
use crate::types::{HrLimits, RhythmMetrics};

/// Number of standard deviations an RR interval may stray from the mean
/// before it is counted as arrhythmic
pub const ARRHYTHMIA_SD_MULTIPLIER: f64 = 2.0;

/// Classifier for turning beat positions into rhythm metrics
pub struct RhythmClassifier;

impl RhythmClassifier {
    /// Classify a sequence of beat sample indices.
    ///
    /// # Arguments
    /// * `peaks` - Strictly increasing sample indices of detected beats
    /// * `sampling_rate` - Samples per second of the source waveform
    /// * `age` - Patient age on the threshold table's scale
    pub fn classify(peaks: &[usize], sampling_rate: f64, age: u32) -> Result<RhythmMetrics> {
        let limits = AgeThresholdTable::lookup(age);
        Self::classify_with_limits(peaks, sampling_rate, &limits)
    }

    /// Classify against explicit limits
    pub fn classify_with_limits(
        peaks: &[usize],
        sampling_rate: f64,
        limits: &HrLimits,
    ) -> Result<RhythmMetrics> {
        let rr = rr_intervals(peaks, sampling_rate)?;
        let heart_rates = instantaneous_heart_rates(&rr);

        let avg_hr = mean(&heart_rates);
        if !avg_hr.is_finite() {
            return Err(RhythmError::InvalidInput(format!(
                "sampling rate {sampling_rate} gives a non-finite heart rate"
            )));
        }
        let brady_threshold = f64::from(limits.brady_threshold);
        let tachy_threshold = f64::from(limits.tachy_threshold);

        let brady_percent = percent_where(&heart_rates, |hr| hr < brady_threshold);
        let tachy_percent = percent_where(&heart_rates, |hr| hr > tachy_threshold);
        let arrhythmia_percent = arrhythmia_percent(&rr);

        debug!(
            beats = peaks.len(),
            intervals = rr.len(),
            avg_hr,
            brady_percent,
            tachy_percent,
            arrhythmia_percent,
            "classified rhythm"
        );

        Ok(RhythmMetrics {
            avg_hr,
            brady_percent,
            tachy_percent,
            arrhythmia_percent,
        })
    }
}

/// Compute RR intervals in seconds from successive beat positions
pub fn rr_intervals(peaks: &[usize], sampling_rate: f64) -> Result<Vec<f64>> {
    if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
        return Err(RhythmError::InvalidInput(format!(
            "sampling rate must be a positive number, got {sampling_rate}"
        )));
    }
    if peaks.len() < 2 {
        return Err(RhythmError::InsufficientData { peaks: peaks.len() });
    }

    peaks
        .windows(2)
        .map(|pair| {
            if pair[1] <= pair[0] {
                return Err(RhythmError::InvalidInput(format!(
                    "beat indices must be strictly increasing ({} then {})",
                    pair[0], pair[1]
                )));
            }
            Ok((pair[1] - pair[0]) as f64 / sampling_rate)
        })
        .collect()
}

/// Convert RR intervals (seconds) to instantaneous heart rates (bpm)
pub fn instantaneous_heart_rates(rr: &[f64]) -> Vec<f64> {
    rr.iter().map(|interval| 60.0 / interval).collect()
}

/// Share of RR intervals lying strictly outside mean ± 2·SD, as a percentage
pub fn arrhythmia_percent(rr: &[f64]) -> f64 {
    let rr_mean = mean(rr);
    let band = ARRHYTHMIA_SD_MULTIPLIER * population_std_dev(rr, rr_mean);
    let (low, high) = (rr_mean - band, rr_mean + band);
    percent_where(rr, |interval| interval < low || interval > high)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn percent_where(values: &[f64], predicate: impl Fn(f64) -> bool) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let hits = values.iter().filter(|&&v| predicate(v)).count();
    (hits as f64 / values.len() as f64 * 100.0).clamp(0.0, 100.0)
}
