//! Core types for the Synheart Rhythm pipeline
//!
//! This module defines the value objects that flow between the stages of an
//! analysis: the patient snapshot, age-derived heart-rate limits, the rhythm
//! metrics produced by the classifier, and the session rows kept in the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RhythmError;

/// Patient gender as captured at the time of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Gender {
    #[default]
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = RhythmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "other" | "o" => Ok(Gender::Other),
            other => Err(RhythmError::InvalidInput(format!("unknown gender: {other}"))),
        }
    }
}

/// Patient details captured alongside each session.
///
/// `name` is the only identity key: two patients sharing a name are treated
/// as the same history. Height, weight, sleep and steps are free-form and are
/// stored exactly as entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PatientProfile {
    pub name: String,
    /// Age on the scale used by the threshold table
    pub age: u32,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub sleep_hours: String,
    #[serde(default)]
    pub step_count: String,
}

impl PatientProfile {
    /// Create a profile with only the fields the engine depends on
    pub fn new(name: impl Into<String>, age: u32) -> Self {
        Self {
            name: name.into(),
            age,
            ..Default::default()
        }
    }
}

/// Age-adjusted heart-rate limits (bpm)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HrLimits {
    /// Lower bound of the normal average heart rate
    pub lower_normal: u32,
    /// Upper bound of the normal average heart rate
    pub upper_normal: u32,
    /// Beats strictly below this rate count as bradycardic
    pub brady_threshold: u32,
    /// Beats strictly above this rate count as tachycardic
    pub tachy_threshold: u32,
}

/// Rhythm metrics derived from one analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RhythmMetrics {
    /// Mean of the instantaneous heart rates (bpm)
    pub avg_hr: f64,
    /// Share of beats below the bradycardia threshold (0-100)
    pub brady_percent: f64,
    /// Share of beats above the tachycardia threshold (0-100)
    pub tachy_percent: f64,
    /// Share of RR intervals outside mean ± 2·SD (0-100)
    pub arrhythmia_percent: f64,
}

/// Arrhythmia share above which a session is flagged as an extreme case
pub const CRITICAL_ARRHYTHMIA_PERCENT: f64 = 50.0;

impl RhythmMetrics {
    pub fn severity(&self) -> Severity {
        if self.arrhythmia_percent > CRITICAL_ARRHYTHMIA_PERCENT {
            Severity::Critical
        } else {
            Severity::Normal
        }
    }

    pub fn value(&self, field: MetricField) -> f64 {
        match field {
            MetricField::AvgHr => self.avg_hr,
            MetricField::BradyPercent => self.brady_percent,
            MetricField::TachyPercent => self.tachy_percent,
            MetricField::ArrhythmiaPercent => self.arrhythmia_percent,
        }
    }
}

/// Reporting severity of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    /// Arrhythmia in more than half of the intervals
    Critical,
}

/// One persisted analysis: the patient snapshot plus its metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcgSession {
    pub profile: PatientProfile,
    pub metrics: RhythmMetrics,
}

/// Metric fields compared between sessions, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    AvgHr,
    BradyPercent,
    TachyPercent,
    ArrhythmiaPercent,
}

impl MetricField {
    pub const ALL: [MetricField; 4] = [
        MetricField::AvgHr,
        MetricField::BradyPercent,
        MetricField::TachyPercent,
        MetricField::ArrhythmiaPercent,
    ];

    /// Column header used by the record table
    pub fn label(&self) -> &'static str {
        match self {
            MetricField::AvgHr => "Avg HR",
            MetricField::BradyPercent => "Bradycardia %",
            MetricField::TachyPercent => "Tachycardia %",
            MetricField::ArrhythmiaPercent => "Arrhythmia %",
        }
    }
}

/// Change of one metric between the prior session and the new analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub field: MetricField,
    pub old_value: f64,
    pub new_value: f64,
}

impl FieldDelta {
    pub fn change(&self) -> f64 {
        self.new_value - self.old_value
    }
}
