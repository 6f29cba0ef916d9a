//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Rhythm. Each request runs
//! the stages in a fixed order:
//!
//! 1. AgeThresholdTable - Resolve age-adjusted limits
//! 2. RhythmClassifier - Compute rhythm metrics from beat positions
//! 3. RecordComparator - Diff against the latest stored session
//! 4. SuggestionEngine - Produce advisory text
//! 5. RecordStore - Append the new session
//!
//! The comparison reads the store before the write, so it only ever sees
//! strictly prior history.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::classifier::RhythmClassifier;
use crate::comparator::{Comparison, RecordComparator};
use crate::detector::PeakDetector;
use crate::error::Result;
use crate::report::{AnalysisReport, PersistenceStatus};
use crate::store::RecordStore;
use crate::suggestions::{Suggestion, SuggestionEngine};
use crate::thresholds::AgeThresholdTable;
use crate::types::{EcgSession, HrLimits, PatientProfile, RhythmMetrics, Severity};
use crate::RHYTHM_VERSION;

/// One analysis request: who, and the detected beats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub profile: PatientProfile,
    /// Strictly increasing beat sample indices
    pub peaks: Vec<usize>,
    /// Samples per second of the recording the peaks came from
    pub sampling_rate: f64,
}

/// Stateless classification result, without history or persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub limits: HrLimits,
    pub metrics: RhythmMetrics,
    pub severity: Severity,
    pub suggestions: Vec<Suggestion>,
}

/// Classify beats and produce suggestions without touching any store.
///
/// # Example
/// ```ignore
/// let assessment = assess_peaks(&[0, 1000, 2000, 3000], 1000.0, 300)?;
/// assert_eq!(assessment.metrics.avg_hr, 60.0);
/// ```
pub fn assess_peaks(peaks: &[usize], sampling_rate: f64, age: u32) -> Result<Assessment> {
    let limits = AgeThresholdTable::lookup(age);
    let metrics = RhythmClassifier::classify_with_limits(peaks, sampling_rate, &limits)?;
    let suggestions = SuggestionEngine::new().evaluate(&metrics, age);

    Ok(Assessment {
        limits,
        severity: metrics.severity(),
        metrics,
        suggestions,
    })
}

/// Analyzer bound to a record store
pub struct RhythmAnalyzer<S: RecordStore> {
    store: S,
    engine: SuggestionEngine,
    persist: bool,
}

impl<S: RecordStore> RhythmAnalyzer<S> {
    /// Create an analyzer that persists every session to `store`
    pub fn new(store: S) -> Self {
        Self {
            store,
            engine: SuggestionEngine::new(),
            persist: true,
        }
    }

    /// Replace the suggestion rule table
    pub fn with_suggestion_engine(mut self, engine: SuggestionEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Analyze and compare without writing the new session
    pub fn without_persistence(mut self) -> Self {
        self.persist = false;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run the full request pipeline on detected beats.
    ///
    /// Invalid input and insufficient beats abort with an error. Store
    /// failures do not: they are reported on the returned report.
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport> {
        let profile = &request.profile;

        // Stage 1: Resolve limits
        let limits = AgeThresholdTable::lookup(profile.age);

        // Stage 2: Classify
        let metrics =
            RhythmClassifier::classify_with_limits(&request.peaks, request.sampling_rate, &limits)?;

        // Stage 3: Compare against strictly prior history
        let comparison = match RecordComparator::compare(&self.store, &profile.name, &metrics) {
            Ok(comparison) => comparison,
            Err(e) => {
                warn!(name = %profile.name, error = %e, "could not read previous records");
                Comparison::Unavailable {
                    reason: e.to_string(),
                }
            }
        };

        // Stage 4: Suggestions
        let suggestions = self.engine.evaluate(&metrics, profile.age);

        // Stage 5: Persist
        let persistence = if self.persist {
            let session = EcgSession {
                profile: profile.clone(),
                metrics,
            };
            match self.store.create(&session) {
                Ok(()) => PersistenceStatus::Saved,
                Err(e) => {
                    warn!(name = %profile.name, error = %e, "session was not persisted");
                    PersistenceStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        } else {
            PersistenceStatus::Skipped
        };

        let severity = metrics.severity();
        info!(
            name = %profile.name,
            avg_hr = metrics.avg_hr,
            severity = ?severity,
            saved = persistence.is_saved(),
            "analysis complete"
        );

        Ok(AnalysisReport {
            report_id: Uuid::new_v4().to_string(),
            analyzer_version: RHYTHM_VERSION.to_string(),
            computed_at_utc: Utc::now(),
            profile: profile.clone(),
            limits,
            metrics,
            severity,
            suggestions,
            comparison,
            persistence,
        })
    }

    /// Detect beats in a raw waveform, then run the full pipeline
    pub fn analyze_waveform(
        &self,
        profile: PatientProfile,
        waveform: &[f64],
        sampling_rate: f64,
        detector: &dyn PeakDetector,
    ) -> Result<AnalysisReport> {
        let peaks = detector.detect_peaks(waveform, sampling_rate)?;
        self.analyze(&AnalysisRequest {
            profile,
            peaks,
            sampling_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::AmplitudePeakDetector;
    use crate::error::{ErrorKind, RhythmError};
    use crate::store::{CsvRecordStore, InMemoryRecordStore};
    use crate::suggestions::SuggestionKind;
    use pretty_assertions::assert_eq;

    const ADULT_AGE: u32 = 300;

    fn request(name: &str, peaks: Vec<usize>) -> AnalysisRequest {
        AnalysisRequest {
            profile: PatientProfile::new(name, ADULT_AGE),
            peaks,
            sampling_rate: 1000.0,
        }
    }

    /// Store whose reads and writes always fail
    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn create(&self, _session: &EcgSession) -> Result<()> {
            Err(RhythmError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only volume",
            )))
        }

        fn find_latest_by_name(&self, _name: &str) -> Result<Option<EcgSession>> {
            Err(RhythmError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "unreadable",
            )))
        }

        fn all(&self) -> Result<Vec<EcgSession>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_assess_peaks() {
        let assessment = assess_peaks(&[0, 1000, 2000, 3000], 1000.0, ADULT_AGE).unwrap();
        assert_eq!(assessment.metrics.avg_hr, 60.0);
        assert_eq!(assessment.severity, Severity::Normal);
        // In range for the adult bracket, so only the age reminder remains
        assert_eq!(
            assessment
                .suggestions
                .iter()
                .map(|s| s.kind)
                .collect::<Vec<_>>(),
            vec![SuggestionKind::CardiovascularCheckup]
        );
    }

    #[test]
    fn test_first_then_second_session() {
        let analyzer = RhythmAnalyzer::new(InMemoryRecordStore::new());

        let first = analyzer
            .analyze(&request("Ada", vec![0, 1000, 2000, 3000]))
            .unwrap();
        assert_eq!(first.comparison, Comparison::NotFound);
        assert_eq!(first.persistence, PersistenceStatus::Saved);
        assert_eq!(analyzer.store().len(), 1);

        let second = analyzer
            .analyze(&request("Ada", vec![0, 800, 1600, 2400]))
            .unwrap();
        match &second.comparison {
            Comparison::Prior { previous, deltas } => {
                assert_eq!(previous.metrics, first.metrics);
                assert_eq!(deltas[0].old_value, 60.0);
                assert!((deltas[0].new_value - 75.0).abs() < 1e-9);
            }
            other => panic!("expected prior session, got {other:?}"),
        }
        assert_eq!(analyzer.store().len(), 2);
    }

    #[test]
    fn test_invalid_requests_abort_without_writing() {
        let analyzer = RhythmAnalyzer::new(InMemoryRecordStore::new());

        let err = analyzer.analyze(&request("Ada", vec![10])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);

        let mut bad_rate = request("Ada", vec![0, 1000]);
        bad_rate.sampling_rate = 0.0;
        let err = analyzer.analyze(&bad_rate).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert!(analyzer.store().is_empty());
    }

    #[test]
    fn test_store_failures_do_not_hide_results() {
        let analyzer = RhythmAnalyzer::new(BrokenStore);
        let report = analyzer
            .analyze(&request("Ada", vec![0, 1000, 2000, 3000]))
            .unwrap();

        assert_eq!(report.metrics.avg_hr, 60.0);
        assert!(!report.suggestions.is_empty());
        assert!(matches!(report.comparison, Comparison::Unavailable { .. }));
        match report.persistence {
            PersistenceStatus::Failed { reason } => assert!(reason.contains("read-only volume")),
            other => panic!("expected failed persistence, got {other:?}"),
        }
    }

    #[test]
    fn test_without_persistence() {
        let analyzer = RhythmAnalyzer::new(InMemoryRecordStore::new()).without_persistence();
        let report = analyzer
            .analyze(&request("Ada", vec![0, 1000, 2000]))
            .unwrap();
        assert_eq!(report.persistence, PersistenceStatus::Skipped);
        assert!(analyzer.store().is_empty());
    }

    #[test]
    fn test_analyze_waveform_with_csv_store() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = RhythmAnalyzer::new(CsvRecordStore::new(dir.path().join("records.csv")));

        // Spikes every 750 samples at 1 kHz: 80 bpm
        let mut waveform = vec![0.0; 4000];
        for center in [200, 950, 1700, 2450, 3200] {
            waveform[center - 1] = 0.5;
            waveform[center] = 1.0;
            waveform[center + 1] = 0.5;
        }

        let report = analyzer
            .analyze_waveform(
                PatientProfile::new("Ada", ADULT_AGE),
                &waveform,
                1000.0,
                &AmplitudePeakDetector::default(),
            )
            .unwrap();

        assert!((report.metrics.avg_hr - 80.0).abs() < 1e-9);
        assert!(report.persistence.is_saved());
        assert_eq!(analyzer.store().all().unwrap().len(), 1);
    }

    #[test]
    fn test_flat_waveform_is_insufficient() {
        let analyzer = RhythmAnalyzer::new(InMemoryRecordStore::new());
        let err = analyzer
            .analyze_waveform(
                PatientProfile::new("Ada", ADULT_AGE),
                &[0.0; 500],
                1000.0,
                &AmplitudePeakDetector::default(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }
}
