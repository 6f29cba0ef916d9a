//! Rhythm CLI - Command-line interface for Synheart Rhythm
//!
//! Commands:
//! - analyze: Classify a recording, compare with history, save the session
//! - records: List every stored session
//! - history: Show the latest stored session for a patient
//! - thresholds: Print the age threshold table
//! - doctor: Diagnose configuration and record store health

use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use synheart_rhythm::config::AnalyzerConfig;
use synheart_rhythm::detector::AmplitudePeakDetector;
use synheart_rhythm::pipeline::{AnalysisRequest, RhythmAnalyzer};
use synheart_rhythm::store::{CsvRecordStore, RecordStore};
use synheart_rhythm::thresholds::{parse_age, AgeThresholdTable};
use synheart_rhythm::types::{EcgSession, Gender, PatientProfile};
use synheart_rhythm::waveform::{load_waveform, parse_waveform};
use synheart_rhythm::{ErrorKind, RhythmError, PRODUCER_NAME, RHYTHM_VERSION};

/// Rhythm - Advisory cardiac rhythm classification
#[derive(Parser)]
#[command(name = "rhythm")]
#[command(author = "Synheart AI Inc")]
#[command(version = RHYTHM_VERSION)]
#[command(about = "Classify heart rhythm from ECG beat timings", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Patient record table (overrides the config file)
    #[arg(long, global = true)]
    records: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (e.g. "debug")
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one recording for a patient
    Analyze {
        /// Patient name (the key for history lookups)
        #[arg(long)]
        name: String,

        /// Patient age
        #[arg(long)]
        age: String,

        /// Patient gender (male, female, other)
        #[arg(long, default_value = "male")]
        gender: String,

        /// Height, stored as entered
        #[arg(long, default_value = "")]
        height: String,

        /// Weight, stored as entered
        #[arg(long, default_value = "")]
        weight: String,

        /// Sleep time, stored as entered
        #[arg(long, default_value = "")]
        sleep: String,

        /// Step count, stored as entered
        #[arg(long, default_value = "")]
        steps: String,

        /// Raw waveform file (text or JSON); beats are detected automatically
        #[arg(long, conflicts_with = "peaks", required_unless_present = "peaks")]
        waveform: Option<PathBuf>,

        /// File of already detected beat sample indices
        #[arg(long)]
        peaks: Option<PathBuf>,

        /// Sampling rate in Hz (overrides the config file)
        #[arg(long)]
        sampling_rate: Option<f64>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Do not write the session to the record table
        #[arg(long)]
        no_save: bool,
    },

    /// List every stored session
    Records {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the latest stored session for a patient
    History {
        /// Patient name
        #[arg(long)]
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print age-adjusted heart-rate thresholds
    Thresholds {
        /// Only show the bracket for this age
        #[arg(long)]
        age: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and record store health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable result panel
    Text,
    /// Pretty-printed JSON report
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), RhythmCliError> {
    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::from_json_file(path)?,
        None => AnalyzerConfig::default(),
    };
    if let Some(records) = cli.records {
        config.records_path = records;
    }

    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));
    debug!(records = %config.records_path.display(), "configuration loaded");

    match cli.command {
        Commands::Analyze {
            name,
            age,
            gender,
            height,
            weight,
            sleep,
            steps,
            waveform,
            peaks,
            sampling_rate,
            format,
            no_save,
        } => {
            let profile = PatientProfile {
                name,
                age: parse_age(&age)?,
                gender: gender.parse::<Gender>()?,
                height,
                weight,
                sleep_hours: sleep,
                step_count: steps,
            };
            if let Some(rate) = sampling_rate {
                config.sampling_rate_hz = rate;
            }
            cmd_analyze(
                &config,
                profile,
                waveform.as_deref(),
                peaks.as_deref(),
                format,
                no_save,
            )
        }
        Commands::Records { json } => cmd_records(&config, json),
        Commands::History { name, json } => cmd_history(&config, &name, json),
        Commands::Thresholds { age, json } => cmd_thresholds(age.as_deref(), json),
        Commands::Doctor { json } => cmd_doctor(&config, cli.config.as_deref(), json),
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Diagnostics go to stderr so stdout stays parseable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn cmd_analyze(
    config: &AnalyzerConfig,
    profile: PatientProfile,
    waveform: Option<&Path>,
    peaks: Option<&Path>,
    format: OutputFormat,
    no_save: bool,
) -> Result<(), RhythmCliError> {
    let mut analyzer = RhythmAnalyzer::new(CsvRecordStore::new(&config.records_path));
    if no_save {
        analyzer = analyzer.without_persistence();
    }

    let rate = config.sampling_rate_hz;
    let report = match (waveform, peaks) {
        (Some(path), _) => {
            let samples = load_waveform(path)?;
            let detector = AmplitudePeakDetector::new(config.detector);
            analyzer.analyze_waveform(profile, &samples, rate, &detector)?
        }
        (None, Some(path)) => {
            let peaks = load_peaks(path)?;
            analyzer.analyze(&AnalysisRequest {
                profile,
                peaks,
                sampling_rate: rate,
            })?
        }
        (None, None) => {
            return Err(RhythmCliError::Rhythm(RhythmError::InvalidInput(
                "either --waveform or --peaks is required".to_string(),
            )))
        }
    };

    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}

/// Beat indices must be non-negative whole numbers
fn load_peaks(path: &Path) -> Result<Vec<usize>, RhythmCliError> {
    let contents = std::fs::read_to_string(path)?;
    parse_waveform(&contents)?
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
                Ok(value as usize)
            } else {
                Err(RhythmCliError::Rhythm(RhythmError::InvalidInput(format!(
                    "peak {index} is not a sample index: {value}"
                ))))
            }
        })
        .collect()
}

fn cmd_records(config: &AnalyzerConfig, json: bool) -> Result<(), RhythmCliError> {
    let store = CsvRecordStore::new(&config.records_path);
    let sessions = store.all()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No records found in {}", config.records_path.display());
        return Ok(());
    }

    println!(
        "{:<20} {:>5} {:<7} {:>8} {:>8} {:>8} {:>8}",
        "Name", "Age", "Gender", "Avg HR", "Brady %", "Tachy %", "Arrh %"
    );
    for session in &sessions {
        print_session_row(session);
    }
    println!("\n{} session(s)", sessions.len());
    Ok(())
}

fn print_session_row(session: &EcgSession) {
    let p = &session.profile;
    let m = &session.metrics;
    println!(
        "{:<20} {:>5} {:<7} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
        p.name,
        p.age,
        p.gender,
        m.avg_hr,
        m.brady_percent,
        m.tachy_percent,
        m.arrhythmia_percent
    );
}

fn cmd_history(config: &AnalyzerConfig, name: &str, json: bool) -> Result<(), RhythmCliError> {
    let store = CsvRecordStore::new(&config.records_path);
    let latest = store.find_latest_by_name(name)?;

    match (latest, json) {
        (Some(session), true) => println!("{}", serde_json::to_string_pretty(&session)?),
        (None, true) => println!("null"),
        (Some(session), false) => {
            let p = &session.profile;
            let m = &session.metrics;
            println!("Latest session for {}", p.name);
            println!("  Age:            {}", p.age);
            println!("  Gender:         {}", p.gender);
            println!("  Height:         {}", p.height);
            println!("  Weight:         {}", p.weight);
            println!("  Sleep Time:     {}", p.sleep_hours);
            println!("  Steps:          {}", p.step_count);
            println!("  Avg HR:         {:.2} bpm", m.avg_hr);
            println!("  Bradycardia %:  {:.2}", m.brady_percent);
            println!("  Tachycardia %:  {:.2}", m.tachy_percent);
            println!("  Arrhythmia %:   {:.2}", m.arrhythmia_percent);
        }
        (None, false) => println!("No previous records found for this patient."),
    }
    Ok(())
}

fn cmd_thresholds(age: Option<&str>, json: bool) -> Result<(), RhythmCliError> {
    let brackets = match age {
        Some(raw) => vec![*AgeThresholdTable::bracket(parse_age(raw)?)],
        None => AgeThresholdTable::brackets().to_vec(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&brackets)?);
        return Ok(());
    }

    println!(
        "{:<11} {:>11} {:>12} {:>7} {:>7}",
        "Bracket", "Ages", "Normal", "Brady", "Tachy"
    );
    for bracket in &brackets {
        let ages = match bracket.max_age {
            Some(max) => format!("[{}, {})", bracket.min_age, max),
            None => format!("[{}, ...)", bracket.min_age),
        };
        let l = &bracket.limits;
        println!(
            "{:<11} {:>11} {:>12} {:>7} {:>7}",
            bracket.label,
            ages,
            format!("{}-{}", l.lower_normal, l.upper_normal),
            format!("< {}", l.brady_threshold),
            format!("> {}", l.tachy_threshold)
        );
    }
    Ok(())
}

fn cmd_doctor(
    config: &AnalyzerConfig,
    config_path: Option<&Path>,
    json: bool,
) -> Result<(), RhythmCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "rhythm_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Rhythm version {}", RHYTHM_VERSION),
    });

    // The config file itself was parsed before dispatch
    checks.push(match config_path {
        Some(path) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!("Loaded {}", path.display()),
        },
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        },
    });

    checks.push(match config.validate() {
        Ok(()) => DoctorCheck {
            name: "settings".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Sampling rate {} Hz, refractory {} ms, threshold ratio {}",
                config.sampling_rate_hz,
                config.detector.refractory_ms,
                config.detector.threshold_ratio
            ),
        },
        Err(e) => DoctorCheck {
            name: "settings".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    let store = CsvRecordStore::new(&config.records_path);
    let records_check = if !store.exists() {
        DoctorCheck {
            name: "records".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "{} does not exist yet; it is created on the first save",
                config.records_path.display()
            ),
        }
    } else {
        match store.all() {
            Ok(sessions) => DoctorCheck {
                name: "records".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "{} holds {} session(s)",
                    config.records_path.display(),
                    sessions.len()
                ),
            },
            Err(e) => DoctorCheck {
                name: "records".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        }
    };
    checks.push(records_check);

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: RHYTHM_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Rhythm Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(RhythmCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum RhythmCliError {
    Rhythm(RhythmError),
    Io(io::Error),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<RhythmError> for RhythmCliError {
    fn from(e: RhythmError) -> Self {
        RhythmCliError::Rhythm(e)
    }
}

impl From<io::Error> for RhythmCliError {
    fn from(e: io::Error) -> Self {
        RhythmCliError::Io(e)
    }
}

impl From<serde_json::Error> for RhythmCliError {
    fn from(e: serde_json::Error) -> Self {
        RhythmCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<RhythmCliError> for CliError {
    fn from(e: RhythmCliError) -> Self {
        match e {
            RhythmCliError::Rhythm(e) => match e.kind() {
                ErrorKind::InvalidInput => CliError {
                    code: "INVALID_INPUT".to_string(),
                    message: e.to_string(),
                    hint: Some("Check the patient details and input files".to_string()),
                },
                ErrorKind::InsufficientData => CliError {
                    code: "INSUFFICIENT_DATA".to_string(),
                    message: e.to_string(),
                    hint: Some("Use a longer recording or check the sampling rate".to_string()),
                },
                ErrorKind::IoFailure => CliError {
                    code: "IO_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some("Run 'rhythm doctor' to check the record table".to_string()),
                },
            },
            RhythmCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            RhythmCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            RhythmCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
