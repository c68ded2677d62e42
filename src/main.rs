use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{Table, Tabled};

use fitmetrics::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use fitmetrics::providers::{
    RecordedSensorProvider, SensorRecording, SessionStore, StaticEntitlement, TracingErrorPresenter,
};
use fitmetrics::store::SqliteSessionStore;
use fitmetrics::{EngineConfig, MetricsEngine, MetricsResult, SessionRecord, WorkoutDefinition};

/// fitmetrics - Workout metrics report
///
/// Computes session counts, streaks and (with --premium) heart-rate based
/// scores from a local session database.
#[derive(Parser)]
#[command(name = "fitmetrics")]
#[command(version)]
#[command(about = "Workout metrics engine CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log level (error, warn, info, debug, trace); overrides -v
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Log output format (pretty, json, compact)
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    /// Also write JSON logs to this file (rotated daily)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Include span enter/exit events in logs
    #[arg(long)]
    log_spans: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import workouts and sessions from a JSON file into the database
    Import {
        /// Session database path
        #[arg(long)]
        db: PathBuf,

        /// JSON file with `workouts` and `sessions` arrays
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Compute and display metrics
    Metrics {
        /// Session database path
        #[arg(long)]
        db: PathBuf,

        /// Scope to one workout
        #[arg(short, long)]
        workout: Option<String>,

        /// Session to compute premium metrics for (requires --workout)
        #[arg(short, long)]
        session: Option<String>,

        /// Sensor recording JSON (quantities + heart-rate samples)
        #[arg(long)]
        sensors: Option<PathBuf>,

        /// Treat the user as entitled to premium metrics
        #[arg(short, long)]
        premium: bool,

        /// Persist computed premium fields back onto the session
        #[arg(long)]
        save: bool,
    },

    /// Show or initialize configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Deserialize)]
struct ImportFile {
    #[serde(default)]
    workouts: Vec<WorkoutDefinition>,
    #[serde(default)]
    sessions: Vec<SessionRecord>,
}

#[derive(Tabled)]
struct MetricRow {
    metric: &'static str,
    value: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&log_config(&cli))?;

    let config_path = cli.config.clone().unwrap_or_else(EngineConfig::default_config_path);
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::load_or_default(),
    };

    match cli.command {
        Commands::Import { db, file } => {
            println!("{}", "Importing sessions...".green().bold());
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let data: ImportFile = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", file.display()))?;

            let store = SqliteSessionStore::open(&db)?;
            for workout in &data.workouts {
                store.insert_workout(workout)?;
            }
            for session in &data.sessions {
                store.insert_session(session)?;
            }
            println!(
                "{}",
                format!(
                    "✓ Imported {} workouts and {} sessions",
                    data.workouts.len(),
                    data.sessions.len()
                )
                .green()
            );
        }

        Commands::Metrics {
            db,
            workout,
            session,
            sensors,
            premium,
            save,
        } => {
            let store = Arc::new(SqliteSessionStore::open(&db)?);
            let recording = match sensors {
                Some(path) => {
                    let json = fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    serde_json::from_str(&json)
                        .with_context(|| format!("Failed to parse {}", path.display()))?
                }
                None => SensorRecording::default(),
            };

            let workout = match workout {
                Some(id) => Some(store.fetch_workout(&id).await?),
                None => None,
            };
            let mut session = match (&session, &workout) {
                (Some(id), Some(w)) => Some(
                    store
                        .fetch_sessions(Some(&w.id))
                        .await?
                        .into_iter()
                        .find(|s| &s.id == id)
                        .with_context(|| format!("Session {} not found for workout {}", id, w.id))?,
                ),
                (Some(_), None) => anyhow::bail!("--session requires --workout"),
                _ => None,
            };

            let engine = MetricsEngine::new(
                store,
                Arc::new(RecordedSensorProvider::new(recording)),
                Arc::new(StaticEntitlement::new(premium)),
                Arc::new(TracingErrorPresenter),
                &config,
            )?;

            let result = engine.fetch_metrics(workout.as_ref(), session.as_ref()).await;
            print_metrics(workout.as_ref(), &result);

            if save {
                if let Some(session) = session.as_mut() {
                    if engine.memoize(session, &result).await? {
                        println!("{}", "✓ Premium metrics saved to session".green());
                    }
                }
            }
        }

        Commands::Config { init } => {
            if init {
                config.save_to_file(&config_path)?;
                println!("{}", format!("✓ Wrote {}", config_path.display()).green());
            }
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn log_config(cli: &Cli) -> LogConfig {
    let mut config = LogConfig::from_verbosity(cli.verbose);
    if let Some(level) = cli.log_level {
        config.level = level;
    }
    config.format = cli.log_format;
    config.file_path = cli.log_file.clone();
    config.include_spans = cli.log_spans;
    config
}

fn print_metrics(workout: Option<&WorkoutDefinition>, result: &MetricsResult) {
    let title = match workout {
        Some(w) => match w.category {
            Some(category) => format!("{} ({})", w.title, category.display_name()),
            None => w.title.clone(),
        },
        None => "All workouts".to_string(),
    };
    println!("{}", title.cyan().bold());

    let opt = |value: Option<String>| value.unwrap_or_else(|| "-".dimmed().to_string());
    let mut rows = vec![
        MetricRow { metric: "Sessions", value: result.total_sessions.to_string() },
        MetricRow { metric: "Average duration (min)", value: result.average_duration_minutes.to_string() },
        MetricRow { metric: "Total duration (min)", value: result.total_duration_minutes.to_string() },
        MetricRow { metric: "Last session (min)", value: result.last_session_duration_minutes.to_string() },
        MetricRow { metric: "Sessions this week", value: result.sessions_per_week.to_string() },
        MetricRow { metric: "Fastest time (s)", value: result.fastest_time_seconds.to_string() },
        MetricRow { metric: "Current streak (days)", value: result.current_streak_days.to_string() },
        MetricRow { metric: "Longest streak (days)", value: result.longest_streak_days.to_string() },
    ];

    if result.has_premium() {
        rows.extend([
            MetricRow { metric: "Intensity score", value: opt(result.intensity_score.map(|v| v.to_string())) },
            MetricRow { metric: "Progress score", value: opt(result.composite_score.map(|v| v.to_string())) },
            MetricRow { metric: "Dominant zone", value: opt(result.dominant_zone.map(|z| format!("{} - {}", z, z.description()))) },
            MetricRow { metric: "Resting HR", value: opt(result.resting_heart_rate.map(|v| format!("{:.0}", v))) },
            MetricRow { metric: "Maximum HR", value: opt(result.maximum_heart_rate.map(|v| format!("{:.0}", v))) },
            MetricRow { metric: "Distance (km)", value: opt(result.estimated_distance_km.map(|v| v.to_string())) },
        ]);
    }

    println!("{}", Table::new(rows));

    if let (Some(workout), false) = (workout, result.split_times.is_empty()) {
        println!("{}", "Splits".cyan().bold());
        for split in &result.split_times {
            let label = workout
                .exercise_for_split(split.order)
                .map(|p| format!("{} (round {})", p.exercise, p.round))
                .unwrap_or_else(|| format!("#{}", split.order + 1));
            println!("  {:<28} {}s", label, split.duration_seconds);
        }
    }
}
