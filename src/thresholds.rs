//! Age-adjusted heart-rate thresholds
//!
//! Limits are resolved from an ordered table of half-open age brackets. The
//! first bracket whose range contains the age wins; the final bracket is open
//! ended so every non-negative age resolves to exactly one row.

use serde::Serialize;

use crate::error::{Result, RhythmError};
use crate::types::HrLimits;

/// One row of the threshold table: ages in `[min_age, max_age)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgeBracket {
    pub min_age: u32,
    /// `None` for the open-ended final bracket
    pub max_age: Option<u32>,
    pub label: &'static str,
    pub limits: HrLimits,
}

impl AgeBracket {
    pub fn contains(&self, age: u32) -> bool {
        age >= self.min_age && self.max_age.map_or(true, |max| age < max)
    }
}

const fn limits(lower: u32, upper: u32, brady: u32, tachy: u32) -> HrLimits {
    HrLimits {
        lower_normal: lower,
        upper_normal: upper,
        brady_threshold: brady,
        tachy_threshold: tachy,
    }
}

/// Bracket boundaries are kept literally; the lower rows read as months and
/// the upper rows as a mix of months and years.
pub const AGE_BRACKETS: [AgeBracket; 8] = [
    AgeBracket {
        min_age: 0,
        max_age: Some(1),
        label: "newborn",
        limits: limits(100, 180, 100, 180),
    },
    AgeBracket {
        min_age: 1,
        max_age: Some(12),
        label: "infant",
        limits: limits(100, 160, 90, 160),
    },
    AgeBracket {
        min_age: 12,
        max_age: Some(36),
        label: "toddler",
        limits: limits(90, 150, 80, 150),
    },
    AgeBracket {
        min_age: 36,
        max_age: Some(72),
        label: "preschool",
        limits: limits(80, 140, 70, 140),
    },
    AgeBracket {
        min_age: 72,
        max_age: Some(144),
        label: "school-age",
        limits: limits(70, 120, 60, 120),
    },
    AgeBracket {
        min_age: 144,
        max_age: Some(216),
        label: "teen",
        limits: limits(60, 100, 50, 100),
    },
    AgeBracket {
        min_age: 216,
        max_age: Some(780),
        label: "adult",
        limits: limits(60, 100, 50, 100),
    },
    AgeBracket {
        min_age: 780,
        max_age: None,
        label: "senior",
        limits: limits(50, 100, 50, 100),
    },
];

/// Pure lookup from age to heart-rate limits
pub struct AgeThresholdTable;

impl AgeThresholdTable {
    /// Resolve the bracket for an age
    pub fn bracket(age: u32) -> &'static AgeBracket {
        AGE_BRACKETS
            .iter()
            .find(|b| b.contains(age))
            // The last bracket is open ended, so the search cannot fall through
            .unwrap_or(&AGE_BRACKETS[AGE_BRACKETS.len() - 1])
    }

    /// Resolve the heart-rate limits for an age
    pub fn lookup(age: u32) -> HrLimits {
        Self::bracket(age).limits
    }

    /// All brackets in evaluation order
    pub fn brackets() -> &'static [AgeBracket] {
        &AGE_BRACKETS
    }
}

/// Parse a user-supplied age, rejecting anything but a non-negative integer
pub fn parse_age(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RhythmError::InvalidInput(format!(
            "age must be a non-negative integer, got {raw:?}"
        )));
    }
    trimmed
        .parse::<u32>()
        .map_err(|e| RhythmError::InvalidInput(format!("age {trimmed} out of range: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_brackets_partition_age_domain() {
        assert_eq!(AGE_BRACKETS[0].min_age, 0);
        for pair in AGE_BRACKETS.windows(2) {
            assert_eq!(pair[0].max_age, Some(pair[1].min_age));
        }
        assert_eq!(AGE_BRACKETS[AGE_BRACKETS.len() - 1].max_age, None);
    }

    #[test]
    fn test_every_age_matches_exactly_one_bracket() {
        for age in (0..1000).chain([u32::MAX - 1, u32::MAX]) {
            let matches = AGE_BRACKETS.iter().filter(|b| b.contains(age)).count();
            assert_eq!(matches, 1, "age {age}");
        }
    }

    #[test]
    fn test_lookup_boundaries() {
        assert_eq!(AgeThresholdTable::lookup(0), limits(100, 180, 100, 180));
        assert_eq!(AgeThresholdTable::lookup(1), limits(100, 160, 90, 160));
        assert_eq!(AgeThresholdTable::lookup(11), limits(100, 160, 90, 160));
        assert_eq!(AgeThresholdTable::lookup(12), limits(90, 150, 80, 150));
        assert_eq!(AgeThresholdTable::lookup(35), limits(90, 150, 80, 150));
        assert_eq!(AgeThresholdTable::lookup(36), limits(80, 140, 70, 140));
        assert_eq!(AgeThresholdTable::lookup(72), limits(70, 120, 60, 120));
        assert_eq!(AgeThresholdTable::lookup(144), limits(60, 100, 50, 100));
        assert_eq!(AgeThresholdTable::lookup(216), limits(60, 100, 50, 100));
        assert_eq!(AgeThresholdTable::lookup(779), limits(60, 100, 50, 100));
        assert_eq!(AgeThresholdTable::lookup(780), limits(50, 100, 50, 100));
    }

    #[test]
    fn test_boundaries_are_literal_not_unit_corrected() {
        // 30 falls in [12, 36), not in the adult row
        let bracket = AgeThresholdTable::bracket(30);
        assert_eq!(bracket.label, "toddler");
        assert_eq!(bracket.limits.brady_threshold, 80);
    }

    #[test]
    fn test_parse_age() {
        assert_eq!(parse_age("42").unwrap(), 42);
        assert_eq!(parse_age(" 7 ").unwrap(), 7);
        assert!(parse_age("-3").is_err());
        assert!(parse_age("4.5").is_err());
        assert!(parse_age("abc").is_err());
        assert!(parse_age("").is_err());
        assert!(parse_age("99999999999").is_err());
    }
}
