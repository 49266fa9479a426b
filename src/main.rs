//! # UAV Log Analyst
//!
//! Extracts flight-health signals and summary metrics from decoded UAV
//! telemetry logs.
//!
//! Each input file is a JSON document mapping message categories to their
//! fields. The tool runs the extraction pipeline over every file, opens an
//! in-memory session for it, appends a line to the analysis report log, and
//! prints the upload response as JSON on stdout.
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- --config config/default.toml flight.json
//! ```
//!
//! Expected output:
//! ```text
//! INFO UAV Log Analyst v0.1.0 starting...
//! INFO Session 4b1c...: 5 metrics, 1 residual signals
//! {
//!   "session_id": "4b1c...",
//!   "dialects": [ ... ],
//!   "filtered_info": { ... },
//!   "metrics": { ... }
//! }
//! ```

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use tracing::{error, info};

use uav_log_analyst::config::Config;
use uav_log_analyst::logging;
use uav_log_analyst::report::{ReportLogger, ReportRecord};
use uav_log_analyst::service::{read_upload, upload_log};
use uav_log_analyst::session::InMemorySessionStore;

/// Configuration file used when `--config` is not given, if present
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

const USAGE: &str = "\
Usage: uav-log-analyst [--config <path>] <telemetry.json>...

Options:
  -c, --config <path>  Configuration file (default: config/default.toml if present)
  -h, --help           Print this help
  -V, --version        Print version";

/// Parsed command line
#[derive(Debug, PartialEq, Eq)]
enum CliAction {
    Run {
        config: Option<String>,
        inputs: Vec<String>,
    },
    Help,
    Version,
}

fn parse_args(args: &[String]) -> Result<CliAction> {
    let mut config = None;
    let mut inputs = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-V" | "--version" => return Ok(CliAction::Version),
            "-c" | "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow!("{} requires a path", arg))?;
                config = Some(path.clone());
            }
            flag if flag.starts_with('-') => {
                bail!("unknown option: {}\n\n{}", flag, USAGE);
            }
            input => inputs.push(input.to_string()),
        }
    }

    if inputs.is_empty() {
        bail!("no telemetry files given\n\n{}", USAGE);
    }
    Ok(CliAction::Run { config, inputs })
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("load config: {}", path)),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("load config: {}", DEFAULT_CONFIG_PATH)),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, inputs) = match parse_args(&args)? {
        CliAction::Run { config, inputs } => (config, inputs),
        CliAction::Help => {
            println!("{}", USAGE);
            return Ok(());
        }
        CliAction::Version => {
            println!("uav-log-analyst {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    let config = load_config(config_path.as_deref())?;
    let _log_guards = logging::init(&config.logging)?;

    info!("UAV Log Analyst v{} starting...", env!("CARGO_PKG_VERSION"));

    let store = InMemorySessionStore::new(&config.session);
    let mut reports = if config.report.enabled {
        Some(ReportLogger::open(&config.report).context("open report log")?)
    } else {
        None
    };

    let mut failures = 0usize;
    for input in &inputs {
        let raw = match read_upload(input, config.ingest.max_upload_bytes).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Skipping {}: {}", input, e);
                failures += 1;
                continue;
            }
        };

        let response = upload_log(&store, &raw).await;

        if let Some(reports) = reports.as_mut() {
            let record = ReportRecord::from_upload(input, &response);
            if let Err(e) = reports.append(&record) {
                error!("Failed to write report for {}: {}", input, e);
            }
        }

        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    info!("Analysed {} of {} files", inputs.len() - failures, inputs.len());

    if failures > 0 {
        bail!("{} of {} files could not be analysed", failures, inputs.len());
    }
    Ok(())
}
