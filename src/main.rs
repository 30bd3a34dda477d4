//! CLI entry point for the VRA delay rater.
//!
//! Provides subcommands for analyzing flight-movement records into a
//! delay report and for cleaning raw VRA exports down to domestic
//! flights.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use vra_delay_rater::analyzers::aggregate::build_report;
use vra_delay_rater::analyzers::types::ReportConfig;
use vra_delay_rater::delay::derive_delays;
use vra_delay_rater::filter::{FilterScope, is_domestic};
use vra_delay_rater::ingest::{read_file, read_records, vra_files_all, vra_files_for_year};
use vra_delay_rater::normalize::{Dataset, clean_record, normalize_records};
use vra_delay_rater::output::{save_cleaned, write_report};

#[derive(Parser)]
#[command(name = "vra_delay_rater")]
#[command(about = "A tool to analyze delays in VRA flight-movement records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
    Both,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScopeArg {
    /// Keep flights with origin AND destination in Brazil
    Both,
    /// Keep flights with at least one Brazilian endpoint
    Either,
}

impl From<ScopeArg> for FilterScope {
    fn from(scope: ScopeArg) -> FilterScope {
        match scope {
            ScopeArg::Both => FilterScope::Both,
            ScopeArg::Either => FilterScope::Either,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the delay report from a file or directory of records
    Analyze {
        /// CSV/JSON/NDJSON file, or a directory of them
        #[arg(value_name = "FILE_OR_DIR")]
        input: String,

        /// Output directory for tables and report.md
        #[arg(short, long, default_value = "relatorio")]
        out: String,

        /// Punctuality threshold in minutes (delay strictly above = delayed)
        #[arg(long, default_value_t = 15)]
        on_time_min: u32,

        /// Minimum flights per airline/year for the rate ranking
        #[arg(long, default_value_t = 20)]
        min_count_airline: u64,
    },
    /// Filter raw VRA exports down to domestic flights and save them
    Clean {
        /// Directory holding the raw VRA_* files
        #[arg(short, long, default_value = "data")]
        data_dir: String,

        /// Target year (e.g. 2022)
        #[arg(short, long)]
        year: Option<i32>,

        /// Process every VRA* file, ignoring --year
        #[arg(long, default_value_t = false)]
        all: bool,

        /// Output directory
        #[arg(short, long, default_value = "out")]
        out: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = FormatArg::Both)]
        format: FormatArg,

        /// Save JSON as NDJSON (one object per line)
        #[arg(long, default_value_t = false)]
        ndjson: bool,

        /// Gzip-compress the outputs
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Which endpoints must be Brazilian
        #[arg(long, value_enum, default_value_t = ScopeArg::Both)]
        scope: ScopeArg,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/vra_delay_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("vra_delay_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            out,
            on_time_min,
            min_count_airline,
        } => analyze(&input, &out, on_time_min, min_count_airline),
        Commands::Clean {
            data_dir,
            year,
            all,
            out,
            format,
            ndjson,
            gzip,
            scope,
        } => clean(&data_dir, year, all, &out, format, ndjson, gzip, scope.into()),
    }
}

#[tracing::instrument(skip_all, fields(input, out))]
fn analyze(input: &str, out: &str, on_time_min: u32, min_count_airline: u64) -> Result<()> {
    let records = read_records(Path::new(input))?;
    if records.is_empty() {
        warn!("no records could be read from the given input");
        return Ok(());
    }
    info!(records = records.len(), "records recovered");

    let Dataset { flights, columns } = normalize_records(&records);
    let mut flights = derive_delays(flights, f64::from(on_time_min));
    flights.retain(|f| f.delay_min.is_some());
    if flights.is_empty() {
        warn!("every record lost its delay metric during normalization, nothing to aggregate");
        return Ok(());
    }
    info!(flights = flights.len(), "flights carry a delay signal");

    let report = build_report(
        &flights,
        &columns,
        ReportConfig {
            on_time_min: f64::from(on_time_min),
            min_count_airline,
        },
    );

    let out_dir = PathBuf::from(out);
    write_report(&report, &out_dir)?;
    info!(out = %out_dir.display(), "report generated");
    Ok(())
}

#[tracing::instrument(skip_all, fields(data_dir, out))]
fn clean(
    data_dir: &str,
    year: Option<i32>,
    all: bool,
    out: &str,
    format: FormatArg,
    ndjson: bool,
    gzip: bool,
    scope: FilterScope,
) -> Result<()> {
    let data_dir = Path::new(data_dir);
    if !data_dir.is_dir() {
        bail!("data directory not found: {}", data_dir.display());
    }

    let (files, out_dir, basename) = if all {
        (
            vra_files_all(data_dir)?,
            PathBuf::from(out).join("BR_ALL"),
            "voos_BR_ALL".to_string(),
        )
    } else if let Some(year) = year {
        (
            vra_files_for_year(data_dir, year)?,
            PathBuf::from(out).join(format!("BR_{year}")),
            format!("voos_BR_{year}"),
        )
    } else {
        bail!("pass --year YYYY or --all");
    };

    if files.is_empty() {
        info!(dir = %data_dir.display(), "no VRA files matched the selection");
        return Ok(());
    }
    info!(files = files.len(), "VRA files selected");

    let mut cleaned = Vec::new();
    for file in &files {
        let records = match read_file(file) {
            Ok(records) => records,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        let total = records.len();
        let domestic: Vec<_> = records
            .iter()
            .map(clean_record)
            .filter(|r| is_domestic(r, scope))
            .collect();
        info!(file = %file.display(), total, domestic = domestic.len(), "file filtered");
        cleaned.extend(domestic);
    }

    if cleaned.is_empty() {
        warn!("no domestic flights found in the selected files");
        return Ok(());
    }

    let want_csv = matches!(format, FormatArg::Csv | FormatArg::Both);
    let want_json = matches!(format, FormatArg::Json | FormatArg::Both);
    save_cleaned(&cleaned, &out_dir, &basename, want_csv, want_json, ndjson, gzip)?;
    info!(rows = cleaned.len(), out = %out_dir.display(), "cleaning finished");
    Ok(())
}
