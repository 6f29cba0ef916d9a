//! Analysis reports
//!
//! An `AnalysisReport` bundles everything produced for one request. It can be
//! rendered as the plain-text result panel or encoded as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::comparator::Comparison;
use crate::error::Result;
use crate::suggestions::Suggestion;
use crate::types::{HrLimits, MetricField, PatientProfile, RhythmMetrics, Severity};

/// Whether the session row reached the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistenceStatus {
    Saved,
    /// The write failed; metrics and suggestions are still valid
    Failed { reason: String },
    /// Persistence was switched off for this request
    Skipped,
}

impl PersistenceStatus {
    pub fn is_saved(&self) -> bool {
        matches!(self, PersistenceStatus::Saved)
    }
}

/// Full result of one analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub report_id: String,
    pub analyzer_version: String,
    pub computed_at_utc: DateTime<Utc>,
    pub profile: PatientProfile,
    pub limits: HrLimits,
    pub metrics: RhythmMetrics,
    pub severity: Severity,
    pub suggestions: Vec<Suggestion>,
    pub comparison: Comparison,
    pub persistence: PersistenceStatus,
}

impl AnalysisReport {
    /// Suggestion texts in order
    pub fn suggestion_messages(&self) -> Vec<&str> {
        self.suggestions.iter().map(|s| s.message.as_str()).collect()
    }

    /// Encode to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render the plain-text result panel
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metrics;
        let l = &self.limits;

        writeln!(f, "Patient: {}", self.profile.name)?;
        writeln!(f, "Age: {}", self.profile.age)?;
        writeln!(f, "Normal HR Range: {}-{} bpm", l.lower_normal, l.upper_normal)?;
        writeln!(f, "Average HR: {:.2} bpm", m.avg_hr)?;
        writeln!(
            f,
            "Bradycardia detected in {:.2}% of beats (Threshold: < {} bpm).",
            m.brady_percent, l.brady_threshold
        )?;
        writeln!(
            f,
            "Tachycardia detected in {:.2}% of beats (Threshold: > {} bpm).",
            m.tachy_percent, l.tachy_threshold
        )?;
        writeln!(f, "Arrhythmias detected in {:.2}% of beats.", m.arrhythmia_percent)?;
        if self.severity == Severity::Critical {
            writeln!(f, "WARNING: Extreme case, severe arrhythmia detected.")?;
        }

        writeln!(f, "\n--- Suggestions ---")?;
        for suggestion in &self.suggestions {
            writeln!(f, "{}", suggestion.message)?;
        }

        match &self.comparison {
            Comparison::Prior { deltas, .. } => {
                writeln!(f, "\n--- Previous Record Comparison ---")?;
                for delta in deltas {
                    let unit = if delta.field == MetricField::AvgHr { " bpm" } else { "" };
                    writeln!(
                        f,
                        "{}: {:.2}{unit} (New: {:.2}{unit})",
                        delta.field.label(),
                        delta.old_value,
                        delta.new_value
                    )?;
                }
            }
            Comparison::NotFound => {
                writeln!(f, "\nNo previous records found for this patient.")?;
            }
            Comparison::Unavailable { reason } => {
                writeln!(f, "\nPrevious records could not be read: {reason}")?;
            }
        }

        match &self.persistence {
            PersistenceStatus::Saved => {
                writeln!(f, "\nPatient data and ECG analysis saved successfully.")
            }
            PersistenceStatus::Failed { reason } => {
                writeln!(f, "\nPatient data was NOT saved: {reason}")
            }
            PersistenceStatus::Skipped => Ok(()),
        }
    }
}
