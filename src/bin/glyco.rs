//! Glyco CLI - Command-line interface for Glycemic Grade
//!
//! Commands:
//! - seed: Populate a store with a synthetic demonstration history
//! - backfill: Fill missing 15-minute slots for a user
//! - grade: Backfill, then grade a user's recent window
//! - score: Grade a plain JSON array of readings
//! - series: Show stored readings grouped by day
//! - table: Print the grading matrix
//! - doctor: Diagnose settings, grading table, and store health

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use glycemic_grade::encoder::ReportEncoder;
use glycemic_grade::settings::Settings;
use glycemic_grade::slots::SlotWindow;
use glycemic_grade::types::BackfillReport;
use glycemic_grade::{
    GlucoseSample, GlycemicScorer, GradeError, GradingTable, InMemoryStore, ScoreResult,
    StoreError, SugarGrader, TimeSeriesStore, GRADE_VERSION, PRODUCER_NAME,
};

/// Glyco - glucose backfill and sugar-control grading
#[derive(Parser)]
#[command(name = "glyco")]
#[command(author = "Synheart AI Inc")]
#[command(version = GRADE_VERSION)]
#[command(about = "Grade glucose control from CGM readings", long_about = None)]
struct Cli {
    /// Settings file (JSON); GLYCO_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate a store with a synthetic demonstration history
    Seed {
        /// Store snapshot file (created if missing)
        #[arg(short, long)]
        store: PathBuf,

        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Days of history to generate
        #[arg(long, default_value = "1")]
        days: u32,

        /// Meal onset hours, comma separated
        #[arg(long, value_delimiter = ',')]
        meals: Option<Vec<u32>>,

        /// Random seed for reproducible data
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Fill missing 15-minute slots for a user
    Backfill {
        /// Store snapshot file (created if missing)
        #[arg(short, long)]
        store: PathBuf,

        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Lookback window in hours
        #[arg(long)]
        hours: Option<u32>,

        /// Random seed for reproducible data
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Backfill, then grade a user's recent window
    Grade {
        /// Store snapshot file (created if missing)
        #[arg(short, long)]
        store: PathBuf,

        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Lookback window in hours
        #[arg(long)]
        hours: Option<u32>,

        /// Random seed for backfilled values
        #[arg(long)]
        seed: Option<u64>,

        /// Output format (text on a terminal, JSON otherwise)
        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// Grade a JSON array of readings without touching a store
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format (text on a terminal, JSON otherwise)
        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// Show stored readings grouped by day
    Series {
        /// Store snapshot file
        #[arg(short, long)]
        store: PathBuf,

        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Lookback window in hours
        #[arg(long)]
        hours: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the grading matrix
    Table {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose settings, grading table, and store health
    Doctor {
        /// Store snapshot file to check
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable breakdown
    Text,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    init_tracing();
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

/// Log to stderr, filtered by GLYCO_LOG (default: warnings only)
fn init_tracing() {
    let filter = EnvFilter::try_from_env("GLYCO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), GlycoCliError> {
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Seed {
            store,
            user,
            days,
            meals,
            seed,
        } => cmd_seed(settings, &store, &user, days, meals, seed),

        Commands::Backfill {
            store,
            user,
            hours,
            seed,
        } => cmd_backfill(settings, &store, &user, hours, seed),

        Commands::Grade {
            store,
            user,
            hours,
            seed,
            format,
        } => cmd_grade(settings, &store, &user, hours, seed, resolve_format(format)),

        Commands::Score { input, format } => cmd_score(&settings, &input, resolve_format(format)),

        Commands::Series {
            store,
            user,
            hours,
            json,
        } => cmd_series(&settings, &store, &user, hours, json),

        Commands::Table { json } => cmd_table(&settings, json),

        Commands::Doctor { store, json } => cmd_doctor(&settings, store.as_deref(), json),
    }
}

fn cmd_seed(
    mut settings: Settings,
    store_path: &Path,
    user: &str,
    days: u32,
    meals: Option<Vec<u32>>,
    seed: Option<u64>,
) -> Result<(), GlycoCliError> {
    if let Some(meals) = meals {
        settings.history.meal_hours = meals;
    }
    settings.seed = seed.or(settings.seed);

    let mut store = InMemoryStore::open(store_path)?;
    let mut normalizer = settings.normalizer();
    let report =
        normalizer.synthesize_full_history(&mut store, user, days, Local::now().naive_local())?;
    store.save(store_path)?;

    print_backfill("Seeded", user, &report);
    Ok(())
}

fn cmd_backfill(
    mut settings: Settings,
    store_path: &Path,
    user: &str,
    hours: Option<u32>,
    seed: Option<u64>,
) -> Result<(), GlycoCliError> {
    settings.seed = seed.or(settings.seed);
    let hours = hours.unwrap_or(settings.window_hours);

    let mut store = InMemoryStore::open(store_path)?;
    let mut normalizer = settings.normalizer();
    let report = normalizer.ensure_dense_series(&mut store, user, hours)?;
    store.save(store_path)?;

    print_backfill("Backfilled", user, &report);
    Ok(())
}

fn cmd_grade(
    mut settings: Settings,
    store_path: &Path,
    user: &str,
    hours: Option<u32>,
    seed: Option<u64>,
    format: OutputFormat,
) -> Result<(), GlycoCliError> {
    settings.seed = seed.or(settings.seed);
    let hours = hours.unwrap_or(settings.window_hours);

    let store = InMemoryStore::open(store_path)?;
    let mut grader = SugarGrader::with_normalizer(store, settings.normalizer())?;
    if settings.grading_table.is_some() {
        grader = grader.with_table(settings.grading_table()?);
    }

    let (result, graded) = grader.grade_with_window(user, hours, Local::now().naive_local())?;
    grader.store().save(store_path)?;

    let encoder = ReportEncoder::new();
    match format {
        OutputFormat::Text => {
            println!("Sugar Grade for user {}", user);
            println!("=========================");
            println!(
                "Window:  {} .. {} ({} readings)",
                graded.window.start.format("%Y-%m-%d %H:%M"),
                graded.window.end.format("%Y-%m-%d %H:%M"),
                graded.sample_count
            );
            print_breakdown(&result);
        }
        OutputFormat::Json => {
            let report = encoder.encode(user, &graded, result);
            println!("{}", serde_json::to_string(&report)?);
        }
        OutputFormat::JsonPretty => {
            println!("{}", encoder.encode_to_json(user, &graded, result)?);
        }
    }

    Ok(())
}

fn cmd_score(settings: &Settings, input: &Path, format: OutputFormat) -> Result<(), GlycoCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let values: Vec<f64> = serde_json::from_str(&input_data)?;
    let table = settings.grading_table()?;
    let result = GlycemicScorer::score(&values, &table)?;

    match format {
        OutputFormat::Text => {
            println!("Sugar Grade ({} readings)", values.len());
            println!("=========================");
            print_breakdown(&result);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(&result)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}

fn cmd_series(
    settings: &Settings,
    store_path: &Path,
    user: &str,
    hours: Option<u32>,
    json: bool,
) -> Result<(), GlycoCliError> {
    let hours = hours.unwrap_or(settings.window_hours);
    let store = InMemoryStore::open(store_path)?;
    let window = SlotWindow::ending_at(Local::now().naive_local(), hours)?;
    let samples = store.query_range(user, window.start, window.end)?;

    let grouped = group_by_day(samples);

    if json {
        println!("{}", serde_json::to_string_pretty(&grouped)?);
        return Ok(());
    }

    if grouped.is_empty() {
        println!("No readings for user {} in the last {} hours", user, hours);
        return Ok(());
    }

    for (date, readings) in &grouped {
        println!("{} ({} readings)", date, readings.len());
        for sample in readings {
            println!("  {}  {:>6.1}", sample.slot_time.format("%H:%M"), sample.value);
        }
    }

    Ok(())
}

fn cmd_table(settings: &Settings, json: bool) -> Result<(), GlycoCliError> {
    let table = settings.grading_table()?;

    if json {
        println!("{}", table.to_json()?);
        return Ok(());
    }

    println!("Grading Matrix");
    println!("==============");
    for rule in table.rules().iter().rev() {
        println!(
            "  {:>3}-{:<3}  grade {:>2}  {:<18} {}",
            rule.score_min, rule.score_max, rule.grade, rule.interpretation, rule.suggested_actions
        );
    }
    Ok(())
}

fn cmd_doctor(settings: &Settings, store: Option<&Path>, json: bool) -> Result<(), GlycoCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} version {}", PRODUCER_NAME, GRADE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "settings".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "window {}h, seed {}",
            settings.window_hours,
            settings
                .seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "random".to_string())
        ),
    });

    checks.push(match settings.grading_table() {
        Ok(table) => DoctorCheck {
            name: "grading_table".to_string(),
            status: CheckStatus::Ok,
            message: format!("{} rules covering 0-100", table.rules().len()),
        },
        Err(e) => DoctorCheck {
            name: "grading_table".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    if let Some(store_path) = store {
        let check = if !store_path.exists() {
            DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Warning,
                message: "Store file does not exist".to_string(),
            }
        } else {
            match InMemoryStore::open(store_path) {
                Ok(store) => match store.grading_rules().map(GradingTable::new) {
                    Ok(Ok(_)) => DoctorCheck {
                        name: "store".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "{} readings for {} users",
                            store.len(),
                            store.users().len()
                        ),
                    },
                    Ok(Err(e)) => DoctorCheck {
                        name: "store".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Store grading table rejected: {}", e),
                    },
                    Err(e) => DoctorCheck {
                        name: "store".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot load store: {}", e),
                },
            }
        };
        checks.push(check);
    }

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: GRADE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Glyco Doctor Report");
        println!("===================");
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(GlycoCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn resolve_format(format: Option<OutputFormat>) -> OutputFormat {
    format.unwrap_or_else(|| {
        if atty::is(atty::Stream::Stdout) {
            OutputFormat::Text
        } else {
            OutputFormat::Json
        }
    })
}

fn group_by_day(samples: Vec<GlucoseSample>) -> BTreeMap<String, Vec<GlucoseSample>> {
    let mut grouped: BTreeMap<String, Vec<GlucoseSample>> = BTreeMap::new();
    for sample in samples {
        grouped
            .entry(sample.slot_date.format("%Y-%m-%d").to_string())
            .or_default()
            .push(sample);
    }
    grouped
}

fn print_backfill(action: &str, user: &str, report: &BackfillReport) {
    println!(
        "{} {} readings for user {} ({} slots, {} already present)",
        action, report.inserted, user, report.slots, report.existing
    );
}

fn print_breakdown(result: &ScoreResult) {
    println!(
        "TIR:          {:>6.2}%   score {}",
        result.tir_percent, result.tir_score
    );
    println!(
        "Variability:  {:>6.2}%   score {}",
        result.variability_percent, result.variability_score
    );
    println!(
        "Avg glucose:  {:>6}    score {}",
        result.avg_glucose, result.avg_score
    );
    println!(
        "Spikes:       {:>6}    score {}",
        result.spike_count, result.spike_score
    );
    println!("Final score:  {}/100", result.final_score);
    println!();
    println!("Grade: {}/10 ({})", result.grade, result.interpretation);
    println!("Suggested actions: {}", result.suggested_actions);
}

// Error types

#[derive(Debug)]
enum GlycoCliError {
    Io(io::Error),
    Grade(GradeError),
    Store(StoreError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for GlycoCliError {
    fn from(e: io::Error) -> Self {
        GlycoCliError::Io(e)
    }
}

impl From<GradeError> for GlycoCliError {
    fn from(e: GradeError) -> Self {
        GlycoCliError::Grade(e)
    }
}

impl From<StoreError> for GlycoCliError {
    fn from(e: StoreError) -> Self {
        GlycoCliError::Store(e)
    }
}

impl From<serde_json::Error> for GlycoCliError {
    fn from(e: serde_json::Error) -> Self {
        GlycoCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GlycoCliError> for CliError {
    fn from(e: GlycoCliError) -> Self {
        match e {
            GlycoCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GlycoCliError::Grade(GradeError::EmptySeries) => CliError {
                code: "NO_DATA".to_string(),
                message: GradeError::EmptySeries.to_string(),
                hint: Some("Provide at least one glucose reading".to_string()),
            },
            GlycoCliError::Grade(GradeError::Store(e)) | GlycoCliError::Store(e) => CliError {
                code: "STORE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'glyco doctor --store <file>' for details".to_string()),
            },
            GlycoCliError::Grade(e @ GradeError::InvalidWindow(_)) => CliError {
                code: "INVALID_WINDOW".to_string(),
                message: e.to_string(),
                hint: Some("Use a shorter --hours or --days value".to_string()),
            },
            GlycoCliError::Grade(e @ GradeError::Config(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the --config file and GLYCO_* variables".to_string()),
            },
            GlycoCliError::Grade(e) => CliError {
                code: "GRADE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'glyco doctor' to check the grading table".to_string()),
            },
            GlycoCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Input must be a JSON array of numbers".to_string()),
            },
            GlycoCliError::DoctorFailed => CliError {
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
