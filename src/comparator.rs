//! Comparison against a patient's previous session
//!
//! The comparison must run before the new session is written, so the prior
//! row it finds is always strictly older than the analysis being reported.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::store::RecordStore;
use crate::types::{EcgSession, FieldDelta, MetricField, RhythmMetrics};

/// Outcome of comparing a new analysis against stored history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Comparison {
    /// A prior session exists for the name
    Prior {
        previous: EcgSession,
        deltas: Vec<FieldDelta>,
    },
    /// No prior session for the name; informational only
    NotFound,
    /// History could not be read; the analysis itself still stands
    Unavailable { reason: String },
}

impl Comparison {
    pub fn is_found(&self) -> bool {
        matches!(self, Comparison::Prior { .. })
    }

    pub fn deltas(&self) -> &[FieldDelta] {
        match self {
            Comparison::Prior { deltas, .. } => deltas,
            Comparison::NotFound | Comparison::Unavailable { .. } => &[],
        }
    }
}

/// Compares new metrics with a patient's most recent stored session
pub struct RecordComparator;

impl RecordComparator {
    /// Look up the latest session for `name` and diff it against `new_metrics`
    pub fn compare(
        store: &dyn RecordStore,
        name: &str,
        new_metrics: &RhythmMetrics,
    ) -> Result<Comparison> {
        match store.find_latest_by_name(name)? {
            Some(previous) => {
                let deltas = diff(&previous.metrics, new_metrics);
                debug!(name, fields = deltas.len(), "compared with previous session");
                Ok(Comparison::Prior { previous, deltas })
            }
            None => {
                info!(name, "no previous records found for patient");
                Ok(Comparison::NotFound)
            }
        }
    }
}

/// Field-by-field deltas in reporting order
pub fn diff(old: &RhythmMetrics, new: &RhythmMetrics) -> Vec<FieldDelta> {
    MetricField::ALL
        .iter()
        .map(|&field| FieldDelta {
            field,
            old_value: old.value(field),
            new_value: new.value(field),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CsvRecordStore, InMemoryRecordStore};
    use crate::types::PatientProfile;
    use pretty_assertions::assert_eq;

    fn metrics(avg_hr: f64, arrhythmia: f64) -> RhythmMetrics {
        RhythmMetrics {
            avg_hr,
            brady_percent: 0.0,
            tachy_percent: 2.5,
            arrhythmia_percent: arrhythmia,
        }
    }

    #[test]
    fn test_no_history() {
        let store = InMemoryRecordStore::new();
        let result = RecordComparator::compare(&store, "Ada", &metrics(70.0, 0.0)).unwrap();
        assert_eq!(result, Comparison::NotFound);
        assert!(result.deltas().is_empty());
    }

    #[test]
    fn test_compare_then_create_then_compare() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvRecordStore::new(dir.path().join("records.csv"));
        let first = metrics(70.0, 4.0);

        let before = RecordComparator::compare(&store, "Ada", &first).unwrap();
        assert!(!before.is_found());

        let session = EcgSession {
            profile: PatientProfile::new("Ada", 300),
            metrics: first,
        };
        store.create(&session).unwrap();

        let second = metrics(64.0, 8.0);
        let after = RecordComparator::compare(&store, "Ada", &second).unwrap();
        match after {
            Comparison::Prior { previous, deltas } => {
                assert_eq!(previous, session);
                assert_eq!(
                    deltas.iter().map(|d| d.field).collect::<Vec<_>>(),
                    MetricField::ALL.to_vec()
                );
                assert_eq!(deltas[0].old_value, 70.0);
                assert_eq!(deltas[0].new_value, 64.0);
                assert_eq!(deltas[3].change(), 4.0);
            }
            other => panic!("expected prior session, got {other:?}"),
        }
    }

    #[test]
    fn test_other_names_are_ignored() {
        let store = InMemoryRecordStore::new();
        store
            .create(&EcgSession {
                profile: PatientProfile::new("Grace", 300),
                metrics: metrics(80.0, 0.0),
            })
            .unwrap();

        let result = RecordComparator::compare(&store, "Ada", &metrics(70.0, 0.0)).unwrap();
        assert_eq!(result, Comparison::NotFound);
    }
}
