//! MediPulse: diabetes risk scoring from the command line.
//!
//! # Usage
//!
//! ```bash
//! medipulse [--config <file>] [--identity <user>] score [--input <file>|-] [--field key=value]...
//! medipulse [--config <file>] [--identity <user>] history
//! medipulse [--config <file>] [--identity <user>] clear
//! ```
//!
//! Responses are JSON on stdout. Logs go to stderr unless
//! `MEDIPULSE_LOG_MODE=file`.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use medipulse::adapters::auth::StaticAuthGateway;
use medipulse::adapters::sanitize::SanitizingMakeWriter;
use medipulse::application::{boot, DefaultScoringService, ErrorBody};
use medipulse::config::AppConfig;
use medipulse::domain::{HistoryEntry, PatientRecord};
use medipulse::ports::AuthGateway;
use medipulse::MedipulseError;

enum Command {
    Score {
        input: Option<String>,
        fields: HashMap<String, String>,
    },
    History,
    Clear,
}

struct Args {
    config: Option<PathBuf>,
    identity: Option<String>,
    command: Command,
}

fn usage() -> String {
    "Usage: medipulse [--config <file>] [--identity <user>] \
     <score [--input <file>|-] [--field key=value]... | history | clear>"
        .to_string()
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    let mut identity = None;
    let mut command = None;
    let mut input = None;
    let mut fields = HashMap::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(args.next().ok_or_else(usage)?)),
            "--identity" => identity = Some(args.next().ok_or_else(usage)?),
            "--input" => input = Some(args.next().ok_or_else(usage)?),
            "--field" => {
                let pair = args.next().ok_or_else(usage)?;
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("--field expects key=value, got {pair:?}"))?;
                fields.insert(key.trim().to_string(), value.to_string());
            }
            "-h" | "--help" => return Err(usage()),
            "score" | "history" | "clear" if command.is_none() => command = Some(arg.clone()),
            _ => return Err(usage()),
        }
    }

    let command = match command.as_deref() {
        Some("score") => Command::Score { input, fields },
        Some("history") => Command::History,
        Some("clear") => Command::Clear,
        _ => return Err(usage()),
    };

    Ok(Args {
        config,
        identity,
        command,
    })
}

/// Flat view of a stored entry for display.
#[derive(Serialize)]
struct HistoryView<'a> {
    id: &'a str,
    timestamp: String,
    input_snapshot: &'a PatientRecord,
    probability: f64,
    percent: f64,
    risk_label: String,
    headline: &'static str,
}

impl<'a> From<&'a HistoryEntry> for HistoryView<'a> {
    fn from(entry: &'a HistoryEntry) -> Self {
        Self {
            id: &entry.id,
            timestamp: entry.timestamp.to_rfc3339(),
            input_snapshot: &entry.input_snapshot,
            probability: entry.result.probability,
            percent: entry.result.percent(),
            risk_label: entry.result.risk_label.to_string(),
            headline: entry.result.risk_label.headline(),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_record(input: &str) -> Result<PatientRecord> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {input:?}"))?
    };
    Ok(serde_json::from_str(&raw)?)
}

/// Run one command; `Ok(false)` means a user-facing error was printed.
fn run(service: &DefaultScoringService, auth: &StaticAuthGateway, command: Command) -> Result<bool> {
    let identity = auth.current_identity();

    let outcome = match command {
        Command::Score { input, fields } => {
            let scored = match input {
                Some(input) => match read_record(&input) {
                    Ok(record) => service.score(&identity, record),
                    Err(e) => {
                        tracing::info!("Malformed request body: {e:#}");
                        print_json(&ErrorBody {
                            kind: "validation",
                            field: None,
                            message: format!("Malformed request body: {e}"),
                        })?;
                        return Ok(false);
                    }
                },
                None => service.score_form(&identity, &fields),
            };
            scored.map(|response| print_json(&response))
        }
        Command::History => service.history(&identity).map(|entries| {
            let views: Vec<HistoryView<'_>> = entries.iter().map(HistoryView::from).collect();
            print_json(&views)
        }),
        Command::Clear => service
            .clear_history(&identity)
            .map(|removed| print_json(&serde_json::json!({ "removed": removed }))),
    };

    match outcome {
        Ok(printed) => {
            printed?;
            Ok(true)
        }
        Err(e) => {
            report(&e);
            print_json(&ErrorBody::from(&e))?;
            Ok(false)
        }
    }
}

fn report(e: &MedipulseError) {
    match e {
        MedipulseError::Validation(_) => tracing::info!("Request rejected: {e}"),
        _ => tracing::error!("Request failed: {e}"),
    }
}

fn main() -> Result<ExitCode> {
    // Initialize logging.
    //
    // stdout carries JSON responses, so logs default to stderr.
    let log_mode = std::env::var("MEDIPULSE_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, _guard) = if log_mode == "file" {
        let log_file = std::env::var("MEDIPULSE_LOG_FILE")
            .unwrap_or_else(|_| "data/medipulse.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            // Best-effort: the open below reports the real failure.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return Ok(ExitCode::from(2));
        }
    };

    let config = AppConfig::load(args.config.as_deref())?;
    let service = boot(&config).context("Failed to start scoring service")?;
    let auth = StaticAuthGateway::resolve(args.identity.as_deref());

    let ok = run(&service, &auth, args.command)?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::from(1) })
}
