//! symptom: command-line client for the headache/symptom tracker.
//!
//! ## Subcommands
//!
//! - `start`, `intervene`, `followup`: write session records
//! - `latest`, `show`, `recent`, `tagged`: read them back as JSON
//! - `clear`: wipe the session store
//! - `track`: live intensity/intervention tracking driven from stdin

mod logging;
mod track;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::io::{self, Write};
use std::path::PathBuf;

use symptom_core::{
    load_config, FactorValue, Factors, FollowupRecord, InterventionRecord, NewFollowup,
    NewInterventionRecord, NewSession, Session, StorageConfig, StoredSession, TrackerConfig,
};
use symptom_store::{SessionStore, StoreError};

#[derive(Parser)]
#[command(name = "symptom")]
#[command(about = "Headache and symptom tracker")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.symptom-tracker/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new headache session
    Start {
        /// Baseline intensity 0-10
        #[arg(long, default_value_t = 5.0)]
        baseline: f64,

        /// Mark a contributing factor (repeatable), e.g. --factor low_sleep
        #[arg(long = "factor", value_name = "NAME")]
        factors: Vec<String>,

        /// Free-text "other" factor
        #[arg(long)]
        other: Option<String>,

        #[arg(long, default_value = "")]
        note: String,
    },

    /// Record an intervention (defaults to the latest session)
    Intervene {
        #[arg(long)]
        session: Option<String>,

        /// Intervention type, e.g. Ibuprofen
        #[arg(long = "type", default_value = "")]
        kind: String,

        #[arg(long, default_value = "")]
        dose: String,

        #[arg(long, default_value = "")]
        note: String,
    },

    /// Record a followup intensity (defaults to the latest session)
    Followup {
        #[arg(long)]
        session: Option<String>,

        /// Minutes since the session started (0-1440)
        #[arg(long, default_value_t = 30.0)]
        minutes: f64,

        /// Intensity 0-10
        #[arg(long, default_value_t = 5.0)]
        intensity: f64,

        #[arg(long, default_value = "")]
        note: String,
    },

    /// Show the most recently started session
    Latest,

    /// Show a session with its interventions and followups
    Show {
        #[arg(value_name = "SESSION_ID")]
        id: String,
    },

    /// List sessions started in the last N days
    Recent {
        #[arg(long)]
        days: Option<u32>,
    },

    /// List sessions tagged with a factor
    Tagged {
        #[arg(value_name = "FACTOR")]
        tag: String,
    },

    /// Delete every session, intervention and followup
    Clear {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Live tracking: reads commands from stdin, one JSON reply per line
    Track,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No sessions recorded yet; run `symptom start` first")]
    NoSession,

    #[error("Session not found: {0}")]
    UnknownSession(String),

    #[error("Refusing to clear without --yes")]
    ClearNotConfirmed,
}

fn main() {
    let cli = Cli::parse();

    let storage = match StorageConfig::from_home() {
        Ok(storage) => storage,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    let logging_guard = logging::init(&storage);

    let config = match load_config(cli.config.as_deref(), &storage) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Failed to load config");
            drop(logging_guard);
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(cli.command, &config, &storage) {
        tracing::error!(error = %err, "symptom command failed");
        drop(logging_guard);
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(
    command: Commands,
    config: &TrackerConfig,
    storage: &StorageConfig,
) -> Result<(), CliError> {
    let open_store = || SessionStore::open(config.db_path(storage));

    match command {
        Commands::Track => {
            track::run(config, io::stdin().lock(), io::stdout().lock())?;
            Ok(())
        }
        Commands::Start {
            baseline,
            factors,
            other,
            note,
        } => {
            let store = open_store()?;
            let mut flags = Factors::new();
            for name in factors {
                flags.insert(name, FactorValue::Flag(true));
            }
            if let Some(other) = other {
                flags.insert("other".to_string(), FactorValue::Text(other));
            }
            let session = Session::new(NewSession {
                baseline,
                factors: flags,
                note,
            });
            store.create_session(&session)?;
            print_json(&StoredSession::from_session(session))
        }
        Commands::Intervene {
            session,
            kind,
            dose,
            note,
        } => {
            let store = open_store()?;
            let session_id = resolve_session(&store, session)?;
            let record = InterventionRecord::new(NewInterventionRecord {
                session_id,
                kind,
                dose,
                note,
            });
            store.add_intervention(&record)?;
            print_json(&record)
        }
        Commands::Followup {
            session,
            minutes,
            intensity,
            note,
        } => {
            let store = open_store()?;
            let session_id = resolve_session(&store, session)?;
            let record = FollowupRecord::new(NewFollowup {
                session_id,
                minutes_after: minutes,
                intensity,
                note,
            });
            store.add_followup(&record)?;
            print_json(&record)
        }
        Commands::Latest => print_json(&open_store()?.get_latest_session()?),
        Commands::Show { id } => match open_store()?.get_session_bundle(&id)? {
            Some(bundle) => print_json(&bundle),
            None => Err(CliError::UnknownSession(id)),
        },
        Commands::Recent { days } => {
            let days = days.unwrap_or(config.history.recent_days);
            print_json(&open_store()?.get_sessions_in_last_days(days)?)
        }
        Commands::Tagged { tag } => print_json(&open_store()?.get_sessions_with_factor(&tag)?),
        Commands::Clear { yes } => {
            if !yes {
                return Err(CliError::ClearNotConfirmed);
            }
            let store = open_store()?;
            let cleared = store.counts()?;
            store.clear_all()?;
            print_json(&json!({ "cleared": cleared }))
        }
    }
}

/// Uses the given id if it exists, otherwise the latest session.
fn resolve_session(store: &SessionStore, requested: Option<String>) -> Result<String, CliError> {
    match requested {
        Some(id) => match store.get_session(&id)? {
            Some(_) => Ok(id),
            None => Err(CliError::UnknownSession(id)),
        },
        None => store
            .get_latest_session()?
            .map(|stored| stored.session.id)
            .ok_or(CliError::NoSession),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
