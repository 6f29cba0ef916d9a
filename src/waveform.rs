//! Waveform loading
//!
//! Raw single-lead recordings are accepted as:
//! - plain text: numbers separated by whitespace, commas or semicolons
//! - a JSON array of numbers (nested arrays are flattened row by row)
//! - a JSON object holding the samples under `"val"` (or `"samples"`)

use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::error::{Result, RhythmError};

/// Keys searched, in order, when a JSON object is supplied
pub const SAMPLE_KEYS: [&str; 2] = ["val", "samples"];

/// Read a waveform from a file
pub fn load_waveform(path: &Path) -> Result<Vec<f64>> {
    let contents = fs::read_to_string(path)?;
    parse_waveform(&contents)
}

/// Parse a waveform from text
pub fn parse_waveform(input: &str) -> Result<Vec<f64>> {
    let trimmed = input.trim_start();
    let samples = if trimmed.starts_with('[') || trimmed.starts_with('{') {
        let value: Value = serde_json::from_str(trimmed)?;
        parse_json(&value)?
    } else {
        parse_delimited(trimmed)?
    };

    if samples.is_empty() {
        return Err(RhythmError::InvalidInput("waveform contains no samples".into()));
    }
    Ok(samples)
}

fn parse_json(value: &Value) -> Result<Vec<f64>> {
    let samples = match value {
        Value::Object(map) => SAMPLE_KEYS
            .iter()
            .find_map(|key| map.get(*key))
            .ok_or_else(|| {
                RhythmError::InvalidInput(format!(
                    "JSON waveform object needs one of the keys {SAMPLE_KEYS:?}"
                ))
            })?,
        other => other,
    };

    let mut out = Vec::new();
    flatten_into(samples, &mut out)?;
    Ok(out)
}

fn flatten_into(value: &Value, out: &mut Vec<f64>) -> Result<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out)?;
            }
            Ok(())
        }
        Value::Number(n) => {
            let sample = n.as_f64().ok_or_else(|| {
                RhythmError::InvalidInput(format!("sample {n} is not representable as f64"))
            })?;
            out.push(sample);
            Ok(())
        }
        other => Err(RhythmError::InvalidInput(format!(
            "waveform sample must be a number, got {other}"
        ))),
    }
}

fn parse_delimited(input: &str) -> Result<Vec<f64>> {
    input
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|token| !token.is_empty())
        .enumerate()
        .map(|(index, token)| {
            token.parse::<f64>().map_err(|e| {
                RhythmError::InvalidInput(format!("waveform token {index} ({token:?}): {e}"))
            })
        })
        .collect()
}
