//! Synheart Rhythm - Advisory cardiac rhythm classification
//!
//! Rhythm turns detected heartbeat positions into rhythm metrics and advisory
//! text through a deterministic pipeline: age threshold lookup → rhythm
//! classification → comparison with the patient's previous session →
//! suggestion rules → session persistence.
//!
//! Output is advisory guidance, not a clinical diagnosis.
//!
//! ## Modules
//!
//! - **Classification**: age-adjusted thresholds and RR-interval metrics
//! - **Advice**: ordered suggestion rules
//! - **History**: append-only session records and comparison against them

pub mod classifier;
pub mod comparator;
pub mod config;
pub mod detector;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod suggestions;
pub mod thresholds;
pub mod types;
pub mod waveform;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use classifier::RhythmClassifier;
pub use comparator::{Comparison, RecordComparator};
pub use config::AnalyzerConfig;
pub use detector::{AmplitudePeakDetector, DetectorConfig, PeakDetector};
pub use error::{ErrorKind, Result, RhythmError};
pub use pipeline::{assess_peaks, AnalysisRequest, Assessment, RhythmAnalyzer};
pub use report::{AnalysisReport, PersistenceStatus};
pub use store::{CsvRecordStore, InMemoryRecordStore, RecordStore};
pub use suggestions::{Suggestion, SuggestionEngine, SuggestionKind};
pub use thresholds::{parse_age, AgeThresholdTable};
pub use types::{EcgSession, Gender, HrLimits, PatientProfile, RhythmMetrics, Severity};

/// Rhythm version embedded in all reports
pub const RHYTHM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "synheart-rhythm";
