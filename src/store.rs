//! Patient record storage
//!
//! Sessions are kept in an append-only table ordered by insertion. There is
//! no update or delete, and names are not unique: the latest row for a name
//! is that patient's most recent session.
//!
//! `CsvRecordStore` persists the table as a flat file with one header row.
//! `InMemoryRecordStore` keeps rows in memory for tests and embedding.

use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::error::{Result, RhythmError};
use crate::thresholds::parse_age;
use crate::types::{EcgSession, Gender, PatientProfile, RhythmMetrics};

/// Default file name of the record table
pub const DEFAULT_RECORDS_FILE: &str = "patient_records.csv";

/// Column headers of the record table, in order
pub const RECORD_HEADERS: [&str; 11] = [
    "Name",
    "Age",
    "Gender",
    "Height",
    "Weight",
    "Sleep Time",
    "Steps",
    "Avg HR",
    "Bradycardia %",
    "Tachycardia %",
    "Arrhythmia %",
];

/// Storage abstraction for past sessions
pub trait RecordStore: Send + Sync {
    /// Append a session as the newest row
    fn create(&self, session: &EcgSession) -> Result<()>;

    /// Most recent session whose name matches exactly, if any
    fn find_latest_by_name(&self, name: &str) -> Result<Option<EcgSession>>;

    /// Every session in store order
    fn all(&self) -> Result<Vec<EcgSession>>;
}

/// On-disk row layout; metric fields carry exactly two decimals
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Age")]
    age: String,
    #[serde(rename = "Gender")]
    gender: String,
    #[serde(rename = "Height")]
    height: String,
    #[serde(rename = "Weight")]
    weight: String,
    #[serde(rename = "Sleep Time")]
    sleep_time: String,
    #[serde(rename = "Steps")]
    steps: String,
    #[serde(rename = "Avg HR")]
    avg_hr: String,
    #[serde(rename = "Bradycardia %")]
    brady_percent: String,
    #[serde(rename = "Tachycardia %")]
    tachy_percent: String,
    #[serde(rename = "Arrhythmia %")]
    arrhythmia_percent: String,
}

impl From<&EcgSession> for RecordRow {
    fn from(session: &EcgSession) -> Self {
        let profile = &session.profile;
        let metrics = &session.metrics;
        Self {
            name: profile.name.clone(),
            age: profile.age.to_string(),
            gender: profile.gender.to_string(),
            height: profile.height.clone(),
            weight: profile.weight.clone(),
            sleep_time: profile.sleep_hours.clone(),
            steps: profile.step_count.clone(),
            avg_hr: format!("{:.2}", metrics.avg_hr),
            brady_percent: format!("{:.2}", metrics.brady_percent),
            tachy_percent: format!("{:.2}", metrics.tachy_percent),
            arrhythmia_percent: format!("{:.2}", metrics.arrhythmia_percent),
        }
    }
}

impl RecordRow {
    fn into_session(self, line: u64) -> Result<EcgSession> {
        let corrupt = |reason: String| RhythmError::CorruptRecord { line, reason };

        let age = parse_age(&self.age).map_err(|e| corrupt(e.to_string()))?;
        let gender = self
            .gender
            .parse::<Gender>()
            .map_err(|e| corrupt(e.to_string()))?;
        let metric = |label: &str, raw: &str| -> Result<f64> {
            raw.trim()
                .parse::<f64>()
                .map_err(|e| corrupt(format!("{label} {raw:?}: {e}")))
        };

        let metrics = RhythmMetrics {
            avg_hr: metric("Avg HR", &self.avg_hr)?,
            brady_percent: metric("Bradycardia %", &self.brady_percent)?,
            tachy_percent: metric("Tachycardia %", &self.tachy_percent)?,
            arrhythmia_percent: metric("Arrhythmia %", &self.arrhythmia_percent)?,
        };

        Ok(EcgSession {
            profile: PatientProfile {
                name: self.name,
                age,
                gender,
                height: self.height,
                weight: self.weight,
                sleep_hours: self.sleep_time,
                step_count: self.steps,
            },
            metrics,
        })
    }
}

/// Record store backed by a flat CSV file.
///
/// Writers are serialised per file, not per instance: every store on the same
/// path shares one in-process lock, and each operation also holds an advisory
/// lock on the file itself (exclusive for appends, shared for reads) so
/// separate processes cannot interleave a header check with another append.
pub struct CsvRecordStore {
    path: PathBuf,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists yet
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Open a reader over existing rows, or `None` when the table was never created.
    ///
    /// The returned reader owns a file handle holding a shared lock.
    fn open_reader(&self) -> Result<Option<csv::Reader<fs::File>>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        FileExt::lock_shared(&file)?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

        let headers = reader.headers()?;
        if headers.is_empty() {
            return Ok(Some(reader));
        }
        if !headers.iter().eq(RECORD_HEADERS.iter().copied()) {
            return Err(RhythmError::CorruptRecord {
                line: 1,
                reason: format!("unexpected header: {}", headers.iter().collect::<Vec<_>>().join(",")),
            });
        }
        Ok(Some(reader))
    }
}

/// In-process lock shared by every `CsvRecordStore` on the same file
fn file_lock(path: &Path) -> Arc<RwLock<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>> = OnceLock::new();
    LOCKS
        .get_or_init(Default::default)
        .lock()
        .entry(lock_key(path))
        .or_default()
        .clone()
}

/// Resolve a path to one key per file, whether or not the file exists yet
fn lock_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    match (
        absolute.parent().and_then(|dir| dir.canonicalize().ok()),
        absolute.file_name(),
    ) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => absolute,
    }
}

impl RecordStore for CsvRecordStore {
    fn create(&self, session: &EcgSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock = file_lock(&self.path);
        let _guard = lock.write();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        FileExt::lock_exclusive(&file)?;

        // Checked under both locks so exactly one writer emits the header
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(&file);
        writer.serialize(RecordRow::from(session))?;
        writer.flush()?;
        drop(writer);

        file.sync_data()?;
        FileExt::unlock(&file)?;

        info!(
            path = %self.path.display(),
            name = %session.profile.name,
            header_written = needs_header,
            "persisted session"
        );
        Ok(())
    }

    fn find_latest_by_name(&self, name: &str) -> Result<Option<EcgSession>> {
        let lock = file_lock(&self.path);
        let _guard = lock.read();

        let Some(mut reader) = self.open_reader()? else {
            debug!(path = %self.path.display(), "record table does not exist yet");
            return Ok(None);
        };

        let mut latest: Option<(u64, RecordRow)> = None;
        for (index, row) in reader.deserialize::<RecordRow>().enumerate() {
            let line = index as u64 + 2;
            let row = row.map_err(|e| RhythmError::CorruptRecord {
                line,
                reason: e.to_string(),
            })?;
            if row.name == name {
                latest = Some((line, row));
            }
        }

        latest.map(|(line, row)| row.into_session(line)).transpose()
    }

    fn all(&self) -> Result<Vec<EcgSession>> {
        let lock = file_lock(&self.path);
        let _guard = lock.read();

        let Some(mut reader) = self.open_reader()? else {
            return Ok(Vec::new());
        };

        reader
            .deserialize::<RecordRow>()
            .enumerate()
            .map(|(index, row)| {
                let line = index as u64 + 2;
                row.map_err(|e| RhythmError::CorruptRecord {
                    line,
                    reason: e.to_string(),
                })?
                .into_session(line)
            })
            .collect()
    }
}

/// Record store kept in memory
#[derive(Default)]
pub struct InMemoryRecordStore {
    sessions: RwLock<Vec<EcgSession>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn create(&self, session: &EcgSession) -> Result<()> {
        self.sessions.write().push(session.clone());
        Ok(())
    }

    fn find_latest_by_name(&self, name: &str) -> Result<Option<EcgSession>> {
        Ok(self
            .sessions
            .read()
            .iter()
            .rev()
            .find(|s| s.profile.name == name)
            .cloned())
    }

    fn all(&self) -> Result<Vec<EcgSession>> {
        Ok(self.sessions.read().clone())
    }
}
