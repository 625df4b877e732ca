use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use vocab_srs::export::{export_progress, import_progress};
use vocab_srs::{
    ExerciseOutcome, LearnerId, Quality, Result, ReviewService, ReviewSession, SchedulerConfig,
    SqliteStore, StorageError, TermId,
};

/// Spaced-repetition scheduler for vocabulary terms
#[derive(Parser)]
#[command(name = "vocab-srs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Schedule vocabulary reviews with SM-2")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Learner whose schedule is used
    #[arg(long, global = true, default_value = "default")]
    learner: String,

    /// Use this instant instead of the stored simulated date (RFC 3339)
    #[arg(long, global = true)]
    at: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register terms the learner has just met
    Discover {
        #[arg(required = true)]
        terms: Vec<String>,
    },

    /// Submit one review, graded directly or from a raw exercise outcome
    Review {
        term: String,
        /// Recall quality 0-5
        #[arg(long, required_unless_present = "outcome", conflicts_with = "outcome")]
        quality: Option<i64>,
        /// Exercise outcome as JSON, e.g. '{"correct":true,"score":1,"kind":"flashcard"}'
        #[arg(long)]
        outcome: Option<String>,
    },

    /// Apply one composite exercise outcome to several terms
    Composite {
        /// Exercise outcome as JSON, including "progress"
        #[arg(long)]
        outcome: String,
        #[arg(required = true)]
        terms: Vec<String>,
    },

    /// List terms that are due, most overdue first
    Due {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Review due terms interactively; type 0-5 to grade, "s" to skip, "q" to stop
    Session {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show schedule statistics for the learner
    Stats,

    /// Move the simulated date forward by one day
    AdvanceDay,

    /// Export the learner's progress to a JSON file
    Export { output: PathBuf },

    /// Import progress from a JSON file, keeping existing rows
    Import { file: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::WARN.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = SchedulerConfig::load(cli.config.as_deref())?;
    let store = SqliteStore::open(&config.database_path)?;
    let service = ReviewService::new(store, config);

    let learner = LearnerId::new(cli.learner);
    let now = match cli.at {
        Some(at) => at,
        None => service.store().current_date()?,
    };

    match cli.command {
        Commands::Discover { terms } => {
            let states = terms
                .into_iter()
                .map(|term| service.discover(&learner, &TermId::new(term), now))
                .collect::<Result<Vec<_>>>()?;
            print_json(&states)
        }
        Commands::Review {
            term,
            quality,
            outcome,
        } => {
            let term = TermId::new(term);
            let state = match (quality, outcome) {
                (Some(quality), _) => {
                    service.submit_review(&learner, &term, Quality::try_from(quality)?, now)?
                }
                (None, Some(outcome)) => {
                    service.submit_outcome(&learner, &term, &parse_outcome(&outcome)?, now)?
                }
                (None, None) => unreachable!("clap requires --quality or --outcome"),
            };
            print_json(&state)
        }
        Commands::Composite { outcome, terms } => {
            let terms: Vec<TermId> = terms.into_iter().map(TermId::new).collect();
            let states =
                service.submit_composite_outcome(&learner, &terms, &parse_outcome(&outcome)?, now)?;
            print_json(&states)
        }
        Commands::Due { limit } => print_json(&service.list_due(&learner, limit, now)?),
        Commands::Session { limit } => run_session(&service, &learner, limit, now),
        Commands::Stats => print_json(&service.stats(&learner, now)?),
        Commands::AdvanceDay => {
            let date = service.store().advance_day()?;
            print_json(&date)
        }
        Commands::Export { output } => {
            let snapshot = export_progress(service.store(), &learner, &output, now)?;
            eprintln!(
                "Exported {} terms for '{}' to {}",
                snapshot.states.len(),
                learner,
                output.display()
            );
            Ok(())
        }
        Commands::Import { file } => print_json(&import_progress(service.store(), &file)?),
    }
}

fn run_session(
    service: &ReviewService<SqliteStore>,
    learner: &LearnerId,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut session = ReviewSession::start(service, learner, limit, now)?;
    let mut lines = io::stdin().lock().lines();
    let mut stdout = io::stdout();

    while let Some(item) = session.current() {
        write!(
            stdout,
            "[{}] {} > ",
            session.phase_message(),
            item.state.term_id
        )
        .map_err(StorageError::from)?;
        stdout.flush().map_err(StorageError::from)?;

        let Some(line) = lines.next() else { break };
        let line = line.map_err(StorageError::from)?;
        match line.trim() {
            "q" => break,
            "s" => session.skip(),
            input => match input.parse::<i64>().map(Quality::try_from) {
                Ok(Ok(quality)) => {
                    session.grade_current(service, quality, now)?;
                }
                _ => eprintln!("enter a grade 0-5, 's' to skip or 'q' to quit"),
            },
        }
    }

    if session.is_completed() {
        eprintln!("Session complete.");
    }
    Ok(())
}

fn parse_outcome(json: &str) -> Result<ExerciseOutcome> {
    Ok(ExerciseOutcome::from_json(json)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(StorageError::from)?;
    println!("{json}");
    Ok(())
}
