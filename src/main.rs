//! CLI entry point for the network performance monitor.
//!
//! Provides subcommands for reading and writing monitor settings and for
//! aggregating throughput samples into daily time-of-day reports, either from
//! a CSV file or streamed on stdin.

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use netperf::bins::{BinsHandle, TimeBins};
use netperf::client_id::client_id;
use netperf::output::{BinReport, print_pretty, write_report_csv, write_report_json};
use netperf::samples::{accumulate, collect_lines, read_samples};
use netperf::settings::{DEFAULT_SETTINGS_FILE, SettingKey, Settings, SettingsError};
use netperf::shutdown::ShutdownFlag;
use std::path::Path;
use std::str::FromStr;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "netperf")]
#[command(about = "Network performance monitor settings and daily reports", long_about = None)]
struct Cli {
    /// Settings file [default: $NETPERF_SETTINGS or /opt/netperf/config/netperf.json]
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read or write a single setting
    Settings {
        /// Print the value of SETTING
        #[arg(
            short = 'g',
            long,
            value_name = "SETTING",
            value_parser = SettingKey::from_str,
            conflicts_with = "set",
            required_unless_present = "set"
        )]
        get: Option<SettingKey>,

        /// Validate VALUE and store it in SETTING
        #[arg(short = 's', long, value_name = "SETTING", value_parser = SettingKey::from_str)]
        set: Option<SettingKey>,

        /// Value used with --set
        #[arg(short = 'v', long, default_value = "")]
        value: String,
    },
    /// Aggregate a CSV file of `timestamp,value` samples into a daily report
    Report {
        /// CSV file with a `timestamp,value` header (unix seconds)
        #[arg(short, long)]
        input: String,

        #[command(flatten)]
        report: ReportArgs,
    },
    /// Aggregate `timestamp,value` lines from stdin until EOF, SIGTERM or Ctrl+C
    Collect {
        #[command(flatten)]
        report: ReportArgs,
    },
}

#[derive(clap::Args, Debug)]
struct ReportArgs {
    /// Bin width in minutes [default: reports.bin_minutes setting, else 60]
    #[arg(short, long)]
    bin_minutes: Option<u32>,

    /// Report file [default: <report_path>/timebins-<date>.csv]
    #[arg(short, long)]
    output: Option<String>,

    /// Write JSON instead of CSV
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Gzip compress the CSV report
    #[arg(long, default_value_t = false, conflicts_with = "json")]
    gzip: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let cli = Cli::parse();

    let config_path = cli
        .config
        .or_else(|| std::env::var("NETPERF_SETTINGS").ok())
        .unwrap_or_else(|| DEFAULT_SETTINGS_FILE.to_string());
    let settings = Settings::load(&config_path);

    let _log_guard = init_tracing(settings.as_ref().ok());

    match cli.command {
        Commands::Settings { get, set, value } => {
            let settings = settings?;
            settings_command(&config_path, settings, get, set, &value)?;
        }
        Commands::Report { input, report } => {
            let settings = settings_or_default(settings);
            report_command(&settings, &input, &report)?;
        }
        Commands::Collect { report } => {
            let settings = settings_or_default(settings);
            let shutdown = ShutdownFlag::install();
            collect_command(&settings, &report, shutdown).await?;
        }
    }

    Ok(())
}

/// Logging setup: colored stderr + JSON rolling log file.
///
/// The stderr level comes from `RUST_LOG`, else the `logging.log_level`
/// setting, else INFO. The log file is `LOG_FILE_PATH`, else the settings log
/// filename; if it cannot be created only stderr logging is enabled.
fn init_tracing(settings: Option<&Settings>) -> Option<WorkerGuard> {
    let log_file_path = std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| {
        settings
            .map(Settings::log_filename)
            .unwrap_or_else(|| Settings::default().log_filename())
    });
    let log_path = Path::new(&log_file_path);
    let log_dir = log_path.parent().unwrap_or(Path::new("log"));
    let log_file_name = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("netperf.log");

    let default_level = settings
        .and_then(Settings::log_level)
        .map(|level| LevelFilter::from_level(level.as_tracing()))
        .unwrap_or(LevelFilter::INFO);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        );

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(log_file_name)
        .build(log_dir);

    let (json_layer, guard, appender_error) = match file_appender {
        Ok(appender) => {
            let (non_blocking_file, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(non_blocking_file)
                .with_filter(
                    EnvFilter::builder()
                        .with_default_directive(LevelFilter::DEBUG.into())
                        .with_env_var("RUST_LOG_JSON")
                        .from_env_lossy(),
                );
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    if let Some(e) = appender_error {
        warn!(path = %log_file_path, error = %e, "Log file unavailable, logging to stderr only");
    }

    guard
}

fn settings_or_default(settings: Result<Settings, SettingsError>) -> Settings {
    settings.unwrap_or_else(|e| {
        warn!(error = %e, "Settings unavailable, using defaults");
        Settings::default()
    })
}

/// Prints one setting, or validates, applies and saves one.
///
/// Invalid values are reported on stdout and leave the settings file untouched.
#[tracing::instrument(skip(settings, value))]
fn settings_command(
    config_path: &str,
    mut settings: Settings,
    get: Option<SettingKey>,
    set: Option<SettingKey>,
    value: &str,
) -> Result<()> {
    if let Some(key) = get {
        let current = key.read(&settings, client_id)?;
        println!("{}", current.as_deref().unwrap_or("None"));
    } else if let Some(key) = set {
        match key.apply(&mut settings, value) {
            Ok(()) => {
                settings.save(config_path)?;
                info!(setting = %key, value, "Setting saved");
            }
            Err(SettingsError::InvalidValue(message)) => println!("{message}"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Aggregates a sample file and writes the report.
#[tracing::instrument(skip(settings, args))]
fn report_command(settings: &Settings, input: &str, args: &ReportArgs) -> Result<()> {
    let mut bins = new_bins(settings, args)?;

    let samples = read_samples(input)?;
    let summary = accumulate(&mut bins, samples);
    info!(
        accepted = summary.accepted,
        rejected = summary.rejected,
        bins = bins.len(),
        "Samples aggregated"
    );

    write_report(settings, &bins, args)
}

/// Streams samples from stdin through a [`BinsHandle`] until EOF or shutdown,
/// then writes the report.
#[tracing::instrument(skip_all)]
async fn collect_command(
    settings: &Settings,
    args: &ReportArgs,
    shutdown: ShutdownFlag,
) -> Result<()> {
    let handle = BinsHandle::spawn(new_bins(settings, args)?);

    info!("Collecting samples from stdin. Press Ctrl+C to stop.");
    let input = BufReader::new(tokio::io::stdin());
    let summary = collect_lines(input, &handle, &shutdown).await?;

    let bins = handle.into_inner().await?;
    info!(
        accepted = summary.accepted,
        rejected = summary.rejected,
        malformed = summary.malformed,
        bins = bins.len(),
        "Collection finished"
    );

    write_report(settings, &bins, args)
}

fn new_bins(settings: &Settings, args: &ReportArgs) -> Result<TimeBins> {
    let bin_minutes = args.bin_minutes.unwrap_or_else(|| settings.bin_minutes());
    TimeBins::new(f64::from(bin_minutes)).context("invalid bin width")
}

fn write_report(settings: &Settings, bins: &TimeBins, args: &ReportArgs) -> Result<()> {
    let report = BinReport::from_snapshot(&bins.snapshot());
    print_pretty(&report);

    let output = match &args.output {
        Some(path) => path.clone(),
        None => default_report_file(settings, args)?,
    };

    if args.json {
        write_report_json(&output, &report)
    } else {
        write_report_csv(&output, &report, args.gzip)
    }
}

/// `<report_path>/timebins-<YYYY-MM-DD>.<ext>` for today's local date.
fn default_report_file(settings: &Settings, args: &ReportArgs) -> Result<String> {
    if settings.data_root().is_none() {
        bail!("no --output given and data_root is not configured");
    }
    let id = client_id().context("failed to derive client id")?;
    let report_path = settings
        .report_path(&id)
        .context("data_root is not configured")?;

    let extension = match (args.json, args.gzip) {
        (true, _) => "json",
        (false, true) => "csv.gz",
        (false, false) => "csv",
    };
    let date = Local::now().format("%Y-%m-%d");
    Ok(format!("{}/timebins-{}.{}", report_path, date, extension))
}
