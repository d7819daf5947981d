// src/main.rs
use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use timebank_core::export::write_csv;
use timebank_core::session::{spawn_session, Command, Outcome, SessionState};
use timebank_core::source::load_entries;
use timebank_core::{
    compute_report, format_balance, format_minutes, Config, EntryBook, Period, Report,
};

#[derive(Parser, Debug)]
#[command(name = "timebank", version, about = "Work-time balance calculator")]
struct Cli {
    /// JSON config file. Without it, TIMEBANK_* environment variables are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `timebank_core=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Print the summary, per-entry rows and balance series for a period.
    Report {
        /// Entries file (.json array or .csv).
        #[arg(long)]
        entries: PathBuf,
        #[command(flatten)]
        period: PeriodArgs,
        /// Print the report as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Write the per-entry results of a period as CSV.
    Export {
        #[arg(long)]
        entries: PathBuf,
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Apply JSON-lines commands ({"action": ..., "payload": ...}) in order.
    Replay {
        #[arg(long)]
        commands: PathBuf,
        /// Optional starting entries.
        #[arg(long)]
        entries: Option<PathBuf>,
        #[command(flatten)]
        period: PeriodArgs,
    },
}

#[derive(Args, Debug)]
struct PeriodArgs {
    #[arg(long, value_enum)]
    period: Option<PeriodChoice>,
    /// Reference date for day/week/month periods (default: today).
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PeriodChoice {
    Day,
    Week,
    Month,
    Range,
}

impl PeriodArgs {
    fn resolve(&self, today: NaiveDate) -> Result<Period> {
        let date = self.date.unwrap_or(today);
        let period = match (self.period, self.from, self.to) {
            (Some(PeriodChoice::Range) | None, Some(from), Some(to)) => Period::range(from, to),
            (Some(PeriodChoice::Range), _, _) => bail!("--period range needs both --from and --to"),
            (None, Some(_), None) | (None, None, Some(_)) => {
                bail!("--from and --to must be given together")
            }
            (Some(PeriodChoice::Day), _, _) => Period::day(date),
            (Some(PeriodChoice::Week), _, _) => Period::week_of(date)?,
            (Some(PeriodChoice::Month), _, _) => Period::month_of(date)?,
            (None, None, None) => match self.date {
                Some(d) => Period::month_of(d)?,
                None => Period::month_to_date(today)?,
            },
        };
        Ok(period)
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(l) => EnvFilter::new(l),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(p) => Config::from_json_file(p)
            .with_context(|| format!("Loading config from {}", p.display()))?,
        None => Config::from_env().context("Loading config from environment")?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_report(report: &Report) {
    let s = &report.summary;
    println!("Period: {} to {}", report.period.start, report.period.end);
    println!(
        "Worked: {}  Expected: {}  Balance: {}  Average/day: {}",
        format_minutes(s.total_worked_minutes),
        format_minutes(s.total_expected_minutes),
        format_balance(s.balance_minutes),
        format_minutes(s.average_per_day_minutes)
    );
    println!(
        "Business days: {}  Days counted: {}",
        s.business_days, s.counted_days
    );

    println!();
    println!(
        "{:<6} {:<10} {:>5} {:>5} {:>5} {:>5} {:>7} {:>7}  {}",
        "id", "date", "in", "l-out", "l-in", "out", "worked", "balance", "note"
    );
    for row in &report.entries {
        let e = &row.entry;
        let eval = &row.evaluation;
        let note = match &eval.issue {
            Some(issue) => format!("[{}] {}", issue, e.note),
            None => e.note.clone(),
        };
        println!(
            "{:<6} {:<10} {:>5} {:>5} {:>5} {:>5} {:>7} {:>7}  {}",
            e.id,
            e.date,
            e.clock_in.as_deref().unwrap_or("-"),
            e.lunch_out.as_deref().unwrap_or("-"),
            e.lunch_in.as_deref().unwrap_or("-"),
            e.clock_out.as_deref().unwrap_or("-"),
            format_minutes(eval.worked_minutes),
            format_balance(eval.balance_minutes),
            note
        );
    }

    println!();
    println!("{:<10} {:>8} {:>10}", "date", "daily", "cumulative");
    for (daily, cumulative) in report.daily_series.iter().zip(&report.cumulative_series) {
        println!(
            "{:<10} {:>8} {:>10}",
            daily.date,
            format_balance(daily.minutes),
            format_balance(cumulative.minutes)
        );
    }
}

fn emit_report(report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_report(report);
    }
    Ok(())
}

async fn replay(commands: PathBuf, state: SessionState) -> Result<Report> {
    let file = File::open(&commands)
        .with_context(|| format!("Opening command file {}", commands.display()))?;
    let (handle, task) = spawn_session(state);

    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("Reading command file")?;
        if line.trim().is_empty() {
            continue;
        }
        let command: Command = serde_json::from_str(&line)
            .with_context(|| format!("Parsing command on line {}", n + 1))?;
        match handle.send(command).await {
            Ok(Outcome::Csv(text)) => print!("{}", text),
            Ok(Outcome::Report(report)) => info!(
                "Line {}: balance now {}",
                n + 1,
                format_balance(report.summary.balance_minutes)
            ),
            Err(e) => warn!("Line {}: {}", n + 1, e),
        }
    }

    drop(handle);
    let state = task.await.context("Session task failed")?;
    Ok(state.report())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = load_config(cli.config.as_ref())?;
    let today = Local::now().date_naive();

    match cli.command {
        CliCommand::Report {
            entries,
            period,
            json,
        } => {
            let period = period.resolve(today)?;
            let entries = load_entries(&entries)?;
            let report = compute_report(&entries, &config, &period);
            emit_report(&report, json)?;
        }
        CliCommand::Export {
            entries,
            period,
            output,
        } => {
            let period = period.resolve(today)?;
            let entries = load_entries(&entries)?;
            let report = compute_report(&entries, &config, &period);
            let file = File::create(&output)
                .with_context(|| format!("Creating {}", output.display()))?;
            write_csv(file, &report)?;
            info!("Wrote {}", output.display());
        }
        CliCommand::Replay {
            commands,
            entries,
            period,
        } => {
            let period = period.resolve(today)?;
            let book = match entries {
                Some(path) => {
                    let (book, superseded) = EntryBook::resolve(load_entries(&path)?);
                    if !superseded.is_empty() {
                        warn!(
                            "{} entries in {} share a date with a newer entry",
                            superseded.len(),
                            path.display()
                        );
                    }
                    book
                }
                None => EntryBook::new(),
            };
            let report = replay(commands, SessionState::new(config, period, book)).await?;
            emit_report(&report, false)?;
        }
    }

    Ok(())
}
