//! Advisory suggestion generation
//!
//! Suggestions come from an ordered rule table. The condition rules are
//! checked in priority order and the first that fires is the only advice
//! returned. When none fires, the average heart rate and the patient's age
//! produce the advice instead, falling back to a single "appears healthy"
//! message.
//!
//! The text is advisory and is not a medical determination.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::thresholds::AgeThresholdTable;
use crate::types::RhythmMetrics;

/// Lower bound (exclusive) of the "mild" band for each condition
pub const MILD_LOWER_PERCENT: f64 = 5.0;
/// Upper bound (exclusive) of the "mild" band, and lower bound (exclusive) of
/// the significant band
pub const SIGNIFICANT_PERCENT: f64 = 15.0;

/// Below this age the pediatric reminder is added
pub const PEDIATRIC_AGE_LIMIT: u32 = 18;
/// From this age the cardiovascular reminder is added
pub const SENIOR_AGE: u32 = 60;

pub const HEALTHY_MESSAGE: &str = "Your health appears to be fine. Continue regular check-ups.";
pub const PEDIATRIC_MESSAGE: &str = "Ensure regular check-ups with a pediatrician.";
pub const CARDIOVASCULAR_MESSAGE: &str = "Regular cardiovascular check-ups are recommended.";

/// What produced a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    MildBradycardia,
    Bradycardia,
    MildTachycardia,
    Tachycardia,
    MildArrhythmia,
    Arrhythmia,
    LowAverageHeartRate,
    HighAverageHeartRate,
    PediatricCheckup,
    CardiovascularCheckup,
    Healthy,
}

/// One advisory message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub message: String,
}

impl Suggestion {
    fn new(kind: SuggestionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A condition rule: fires when `applies` holds and ends evaluation
#[derive(Clone, Copy)]
pub struct ConditionRule {
    pub kind: SuggestionKind,
    pub applies: fn(&RhythmMetrics) -> bool,
    pub message: &'static str,
}

impl fmt::Debug for ConditionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionRule")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

fn is_mild(percent: f64) -> bool {
    percent > MILD_LOWER_PERCENT && percent < SIGNIFICANT_PERCENT
}

fn is_significant(percent: f64) -> bool {
    percent > SIGNIFICANT_PERCENT
}

fn mild_bradycardia(m: &RhythmMetrics) -> bool {
    is_mild(m.brady_percent)
}

fn bradycardia(m: &RhythmMetrics) -> bool {
    is_significant(m.brady_percent)
}

fn mild_tachycardia(m: &RhythmMetrics) -> bool {
    is_mild(m.tachy_percent)
}

fn tachycardia(m: &RhythmMetrics) -> bool {
    is_significant(m.tachy_percent)
}

fn mild_arrhythmia(m: &RhythmMetrics) -> bool {
    is_mild(m.arrhythmia_percent)
}

fn arrhythmia(m: &RhythmMetrics) -> bool {
    is_significant(m.arrhythmia_percent)
}

/// Condition rules in priority order
pub const CONDITION_RULES: [ConditionRule; 6] = [
    ConditionRule {
        kind: SuggestionKind::MildBradycardia,
        applies: mild_bradycardia,
        message: "Mild Bradycardia detected. If you have any other symptoms consult doctor or take it easy.",
    },
    ConditionRule {
        kind: SuggestionKind::Bradycardia,
        applies: bradycardia,
        message: "Bradycardia detected. Please consult a healthcare provider.",
    },
    ConditionRule {
        kind: SuggestionKind::MildTachycardia,
        applies: mild_tachycardia,
        message: "Mild Tachycardia detected. If you have any other symptoms consult doctor or take it easy.",
    },
    ConditionRule {
        kind: SuggestionKind::Tachycardia,
        applies: tachycardia,
        message: "Tachycardia detected. Please consult a healthcare provider.",
    },
    ConditionRule {
        kind: SuggestionKind::MildArrhythmia,
        applies: mild_arrhythmia,
        message: "Mild arrhythmia detected. If you have any other symptoms consult doctor or take it easy.",
    },
    ConditionRule {
        kind: SuggestionKind::Arrhythmia,
        applies: arrhythmia,
        message: "Arrhythmia detected. Please consult a healthcare provider.",
    },
];

/// Rule-based suggestion engine
pub struct SuggestionEngine {
    rules: Vec<ConditionRule>,
}

impl Default for SuggestionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionEngine {
    /// Create an engine with the standard rule table
    pub fn new() -> Self {
        Self::with_rules(CONDITION_RULES.to_vec())
    }

    /// Create an engine with a custom ordered rule table
    pub fn with_rules(rules: Vec<ConditionRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ConditionRule] {
        &self.rules
    }

    /// Produce ordered advisory suggestions for the given metrics
    pub fn evaluate(&self, metrics: &RhythmMetrics, age: u32) -> Vec<Suggestion> {
        if let Some(rule) = self.rules.iter().find(|rule| (rule.applies)(metrics)) {
            return vec![Suggestion::new(rule.kind, rule.message)];
        }

        let mut suggestions = Vec::new();

        let limits = AgeThresholdTable::lookup(age);
        if metrics.avg_hr < f64::from(limits.lower_normal) {
            suggestions.push(Suggestion::new(
                SuggestionKind::LowAverageHeartRate,
                format!(
                    "Your average heart rate is below normal ({:.2} bpm). Please consult a healthcare provider.",
                    metrics.avg_hr
                ),
            ));
        } else if metrics.avg_hr > f64::from(limits.upper_normal) {
            suggestions.push(Suggestion::new(
                SuggestionKind::HighAverageHeartRate,
                format!(
                    "Your average heart rate is above normal ({:.2} bpm). Please consult a healthcare provider.",
                    metrics.avg_hr
                ),
            ));
        }

        if age < PEDIATRIC_AGE_LIMIT {
            suggestions.push(Suggestion::new(
                SuggestionKind::PediatricCheckup,
                PEDIATRIC_MESSAGE,
            ));
        } else if age >= SENIOR_AGE {
            suggestions.push(Suggestion::new(
                SuggestionKind::CardiovascularCheckup,
                CARDIOVASCULAR_MESSAGE,
            ));
        }

        if suggestions.is_empty() {
            suggestions.push(Suggestion::new(SuggestionKind::Healthy, HEALTHY_MESSAGE));
        }

        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metrics(avg_hr: f64, brady: f64, tachy: f64, arrhythmia: f64) -> RhythmMetrics {
        RhythmMetrics {
            avg_hr,
            brady_percent: brady,
            tachy_percent: tachy,
            arrhythmia_percent: arrhythmia,
        }
    }

    fn kinds(suggestions: &[Suggestion]) -> Vec<SuggestionKind> {
        suggestions.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_significant_bradycardia_only() {
        let engine = SuggestionEngine::new();
        let out = engine.evaluate(&metrics(45.0, 20.0, 0.0, 0.0), 30);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, SuggestionKind::Bradycardia);
        assert_eq!(
            out[0].message,
            "Bradycardia detected. Please consult a healthcare provider."
        );
    }

    #[test]
    fn test_healthy_adult() {
        // Age 30 resolves to limits 90-150 in the literal table
        let engine = SuggestionEngine::new();
        let out = engine.evaluate(&metrics(100.0, 0.0, 0.0, 0.0), 30);
        assert_eq!(out, vec![Suggestion::new(SuggestionKind::Healthy, HEALTHY_MESSAGE)]);
    }

    #[test]
    fn test_priority_short_circuit() {
        let engine = SuggestionEngine::new();

        let out = engine.evaluate(&metrics(70.0, 10.0, 40.0, 90.0), 30);
        assert_eq!(kinds(&out), vec![SuggestionKind::MildBradycardia]);

        let out = engine.evaluate(&metrics(70.0, 0.0, 40.0, 90.0), 30);
        assert_eq!(kinds(&out), vec![SuggestionKind::Tachycardia]);

        let out = engine.evaluate(&metrics(70.0, 0.0, 7.0, 90.0), 30);
        assert_eq!(kinds(&out), vec![SuggestionKind::MildTachycardia]);

        let out = engine.evaluate(&metrics(70.0, 0.0, 0.0, 10.0), 70);
        assert_eq!(kinds(&out), vec![SuggestionKind::MildArrhythmia]);

        let out = engine.evaluate(&metrics(70.0, 0.0, 0.0, 60.0), 70);
        assert_eq!(kinds(&out), vec![SuggestionKind::Arrhythmia]);
    }

    #[test]
    fn test_band_edges_do_not_fire() {
        let engine = SuggestionEngine::new();
        for edge in [5.0, 15.0] {
            let out = engine.evaluate(&metrics(100.0, edge, edge, edge), 30);
            assert_eq!(kinds(&out), vec![SuggestionKind::Healthy], "edge {edge}");
        }
    }

    #[test]
    fn test_low_average_with_pediatric_reminder() {
        // Age 10 resolves to limits 100-160
        let engine = SuggestionEngine::new();
        let out = engine.evaluate(&metrics(80.0, 0.0, 0.0, 0.0), 10);
        assert_eq!(
            kinds(&out),
            vec![
                SuggestionKind::LowAverageHeartRate,
                SuggestionKind::PediatricCheckup
            ]
        );
        assert!(out[0].message.contains("(80.00 bpm)"));
    }

    #[test]
    fn test_high_average_with_cardiovascular_reminder() {
        // Age 65 resolves to limits 80-140
        let engine = SuggestionEngine::new();
        let out = engine.evaluate(&metrics(150.0, 0.0, 0.0, 0.0), 65);
        assert_eq!(
            kinds(&out),
            vec![
                SuggestionKind::HighAverageHeartRate,
                SuggestionKind::CardiovascularCheckup
            ]
        );
    }

    #[test]
    fn test_age_reminder_alone_suppresses_healthy_message() {
        let engine = SuggestionEngine::new();
        let out = engine.evaluate(&metrics(110.0, 0.0, 0.0, 0.0), 65);
        assert_eq!(kinds(&out), vec![SuggestionKind::CardiovascularCheckup]);
    }

    #[test]
    fn test_custom_rule_table() {
        let engine = SuggestionEngine::with_rules(vec![CONDITION_RULES[5]]);
        // Bradycardia rules are absent, so only arrhythmia can fire
        let out = engine.evaluate(&metrics(100.0, 50.0, 0.0, 30.0), 30);
        assert_eq!(kinds(&out), vec![SuggestionKind::Arrhythmia]);
    }
}
