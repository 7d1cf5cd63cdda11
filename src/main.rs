use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use editwars::batch::{BatchReport, Harvester};
use editwars::client::WikiClient;
use editwars::config::ClientConfig;
use editwars::history::HistoryFilter;

#[derive(Debug, clap::Parser)]
#[command(version, about = "Harvest edit war metadata from Wikipedia")]
struct CommandLine {
    #[command(subcommand)]
    command: Command,

    /// Write JSON lines here instead of stdout.
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    /// Delay before every page request, in milliseconds.
    #[arg(long, global = true, env = "EDITWARS_COURTESY_DELAY_MS")]
    delay_ms: Option<u64>,

    /// Cooldown after a throttling response, in seconds.
    #[arg(long, global = true, env = "EDITWARS_THROTTLE_COOLDOWN_SECS")]
    cooldown_secs: Option<u64>,

    /// More logging; repeat for more. `RUST_LOG` takes precedence.
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, clap::Args)]
struct Targets {
    /// Article titles in the source language, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    titles: Vec<String>,

    /// Language editions to harvest, comma separated.
    #[arg(long, value_delimiter = ',', default_value = "en", env = "EDITWARS_LANGUAGES")]
    languages: Vec<String>,

    /// Language the titles are given in.
    #[arg(long, default_value = "en", env = "EDITWARS_SOURCE_LANGUAGE")]
    source_language: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the title of an article in another language edition.
    Resolve {
        title: String,
        #[arg(long, default_value = "en")]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Revisions per calendar month.
    Monthly {
        #[command(flatten)]
        targets: Targets,
        /// Walk the history back to this date (YYYY-MM-DD).
        #[arg(long, value_parser = parse_date)]
        since: DateTime<Utc>,
        /// Server-side history filter (reverted, anonymous, bot, editors, minor).
        #[arg(long, value_parser = parse_filter)]
        filter: Option<HistoryFilter>,
    },
    /// Individual revisions joined with editor edit counts.
    Revisions {
        #[command(flatten)]
        targets: Targets,
        #[arg(long, value_parser = parse_date)]
        since: Option<DateTime<Utc>>,
    },
    /// Protection log events with normalized expiry.
    Protections {
        #[command(flatten)]
        targets: Targets,
    },
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_filter(value: &str) -> Result<HistoryFilter, String> {
    HistoryFilter::parse(value).ok_or_else(|| format!("unknown history filter `{value}`"))
}

fn write_records<T: Serialize>(records: &[T], output: Option<&PathBuf>) -> io::Result<()> {
    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

fn finish<T: Serialize>(report: BatchReport<T>, output: Option<&PathBuf>) -> Result<ExitCode, Box<dyn std::error::Error>> {
    write_records(&report.records, output)?;
    eprintln!("{report}");
    for failure in &report.failed {
        eprintln!(
            "  {}:{} {} ({}retryable): {}",
            failure.language,
            failure.title,
            failure.kind,
            if failure.retryable { "" } else { "not " },
            failure.reason
        );
    }
    Ok(if report.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn run(args: CommandLine) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut config = ClientConfig::from_env();
    if let Some(delay) = args.delay_ms {
        config.courtesy_delay = Duration::from_millis(delay);
    }
    if let Some(cooldown) = args.cooldown_secs {
        config.throttle_cooldown = Duration::from_secs(cooldown);
    }
    let mut client = WikiClient::from_config(config)?;
    let output = args.output.as_ref();

    match args.command {
        Command::Resolve { title, from, to } => {
            let resolved = client.resolve_title(&title, &from, &to)?;
            println!("{resolved}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Monthly {
            targets,
            since,
            filter,
        } => {
            let mut harvester =
                Harvester::new(client, &targets.source_language).with_history_filter(filter);
            let report = harvester.monthly_counts(&targets.titles, &targets.languages, since);
            finish(report, output)
        }
        Command::Revisions { targets, since } => {
            let mut harvester = Harvester::new(client, &targets.source_language);
            let report = harvester.revisions(&targets.titles, &targets.languages, since);
            finish(report, output)
        }
        Command::Protections { targets } => {
            let mut harvester = Harvester::new(client, &targets.source_language);
            let report = harvester.protections(&targets.titles, &targets.languages);
            finish(report, output)
        }
    }
}

fn main() -> ExitCode {
    let args: CommandLine = CommandLine::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(message = "aborting", error = %e);
            ExitCode::FAILURE
        }
    }
}
