//! Error types for Synheart Rhythm

use thiserror::Error;

/// Errors that can occur during rhythm analysis or record persistence
#[derive(Debug, Error)]
pub enum RhythmError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient data: {peaks} beat(s) detected, at least 2 are required")]
    InsufficientData { peaks: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt record at line {line}: {reason}")]
    CorruptRecord { line: u64, reason: String },
}

/// Coarse failure category surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad age, sampling rate or peak sequence; aborts the request
    InvalidInput,
    /// Too few beats to form an RR interval; aborts the request
    InsufficientData,
    /// The record store could not be read or written
    IoFailure,
}

impl RhythmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RhythmError::InvalidInput(_) => ErrorKind::InvalidInput,
            RhythmError::InsufficientData { .. } => ErrorKind::InsufficientData,
            RhythmError::Io(_) | RhythmError::Csv(_) | RhythmError::CorruptRecord { .. } => {
                ErrorKind::IoFailure
            }
            // JSON only enters through request payloads and config files
            RhythmError::Json(_) => ErrorKind::InvalidInput,
        }
    }
}

pub type Result<T> = std::result::Result<T, RhythmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            RhythmError::InvalidInput("age".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            RhythmError::InsufficientData { peaks: 1 }.kind(),
            ErrorKind::InsufficientData
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(RhythmError::from(io).kind(), ErrorKind::IoFailure);
        assert_eq!(
            RhythmError::CorruptRecord {
                line: 3,
                reason: "bad".into()
            }
            .kind(),
            ErrorKind::IoFailure
        );
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = RhythmError::InsufficientData { peaks: 1 };
        assert!(err.to_string().contains("1 beat(s)"));
    }
}
