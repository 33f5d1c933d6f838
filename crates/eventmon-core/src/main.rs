//! EventMon CLI
//!
//! Command-line interface for the EventMon rate monitor.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eventmon::alerting::{AlertSink, InMemoryAlerter};
use eventmon::config::LoggingConfig;
use eventmon::models::{load_monitor_definitions, Event, MonitorSnapshot};
use eventmon::monitor::MonitorSet;
use eventmon::replay::Replayer;
use eventmon::scheduler::Scheduler;
use tokio::io::{AsyncBufReadExt, BufReader as AsyncBufReader};
use tracing::{info, warn};

/// EventMon - Event rate monitoring
#[derive(Parser)]
#[command(name = "eventmon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "EVENTMON_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate monitor definitions
    Validate {
        /// Monitor definition file (defaults to monitors.file from config)
        #[arg(long)]
        monitors: Option<PathBuf>,
    },

    /// Replay recorded NDJSON events against the monitors
    Replay {
        /// Monitor definition file (defaults to monitors.file from config)
        #[arg(long)]
        monitors: Option<PathBuf>,

        /// Event file (stdin if not specified)
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Run monitors on the wall clock, reading NDJSON events from stdin
    Run {
        /// Monitor definition file (defaults to monitors.file from config)
        #[arg(long)]
        monitors: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match eventmon::Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging, cli.verbose);

    let result = match cli.command {
        Commands::Validate { monitors } => {
            run_validate(monitors.as_deref().unwrap_or(config.monitors.file.as_path()), cli.format)
        }
        Commands::Replay { monitors, events } => run_replay(
            monitors.as_deref().unwrap_or(config.monitors.file.as_path()),
            events.as_deref(),
            cli.format,
        ),
        Commands::Run { monitors } => {
            run_monitors(&config, monitors.as_deref().unwrap_or(config.monitors.file.as_path()), cli.format).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let log_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_monitors(path: &Path, sink: Arc<dyn AlertSink>) -> anyhow::Result<MonitorSet> {
    info!(path = %path.display(), "Loading monitor definitions");
    let definitions = load_monitor_definitions(path)?;
    Ok(MonitorSet::from_definitions(&definitions, Scheduler::current()?, sink)?)
}

fn run_validate(path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let monitors = build_monitors(path, Arc::new(InMemoryAlerter::new()))?;

    if format == OutputFormat::Json {
        let predicates: Vec<_> = monitors
            .iter()
            .map(|m| serde_json::json!({ "name": m.name(), "predicate": format!("{:?}", m.predicate()) }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&predicates)?);
        return Ok(());
    }

    println!("{} monitor(s) valid", monitors.len());
    for monitor in monitors.iter() {
        println!("  {:<30} {:?}", monitor.name(), monitor.predicate());
    }
    Ok(())
}

fn run_replay(path: &Path, events: Option<&Path>, format: OutputFormat) -> anyhow::Result<()> {
    let alerter = Arc::new(InMemoryAlerter::new());
    let monitors = build_monitors(path, alerter.clone())?;

    let mut replayer = Replayer::new(&monitors);
    match events {
        Some(events) => replayer.push_ndjson(BufReader::new(File::open(events)?))?,
        None => replayer.push_ndjson(io::stdin().lock())?,
    }
    let report = replayer.finish();

    if format == OutputFormat::Json {
        let output = serde_json::json!({ "report": report, "alerts": alerter.history() });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "Replayed {} event(s), {} match(es), {} tick(s), {} out of order",
        report.events, report.matches, report.ticks, report.out_of_order
    );
    println!();
    println!("Alerts:");
    for record in alerter.history() {
        println!("  {}  {:<8} {}", record.at.to_rfc3339(), record.kind.to_string(), record.monitor);
    }
    println!();
    print_snapshots(&report.snapshots);
    Ok(())
}

async fn run_monitors(
    config: &eventmon::Config,
    path: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let monitors = build_monitors(path, config.alerting.build_sink()?)?;
    monitors.start_all();
    info!(count = monitors.len(), "Monitors started, reading events from stdin");

    let mut lines = AsyncBufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("End of input");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Event>(&line) {
                    Ok(event) => {
                        monitors.ingest(&event);
                    }
                    Err(e) => warn!(error = %e, "Skipping malformed event"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
                break;
            }
        }
    }

    monitors.stop_all();

    let snapshots = monitors.snapshots();
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
    } else {
        print_snapshots(&snapshots);
    }
    Ok(())
}

fn print_snapshots(snapshots: &[MonitorSnapshot]) {
    println!(
        "{:<30} {:>10} {:>10} {:>10} {:>10} {:>10}  STATE",
        "MONITOR", "COUNT", "1M", "5M", "15M", "MIN 5M"
    );
    for s in snapshots {
        println!(
            "{:<30} {:>10} {:>10.3} {:>10.3} {:>10.3} {:>10.3}  {}",
            s.name,
            s.total_count,
            s.one_minute_rate,
            s.five_minute_rate,
            s.fifteen_minute_rate,
            s.min_five_minute_rate,
            s.alert_state
        );
    }
}
