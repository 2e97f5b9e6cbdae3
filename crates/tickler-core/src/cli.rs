use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tick",
    version,
    about = "Tickler: day-planned to-dos with local reminders",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a task, optionally with a reminder and a note.
    Add {
        name: String,

        /// Reminder: RFC 3339, `YYYY-MM-DDTHH:mm` local, or `YYYY-MM-DD`
        /// for a whole-day reminder.
        #[arg(long = "at")]
        remind_at: Option<String>,

        #[arg(long = "note")]
        note: Option<String>,
    },

    /// Flat task listing in canonical order.
    List,

    /// The month/day dashboard (default command).
    Schedule,

    /// Mark a task complete.
    Done { id: String },

    /// Mark a completed task pending again.
    Reopen { id: String },

    /// Change fields of a task; unspecified fields stay untouched.
    Edit {
        id: String,

        #[arg(long = "name")]
        name: Option<String>,

        #[arg(long = "at", conflicts_with = "clear_at")]
        remind_at: Option<String>,

        /// Clear the reminder, making the task a draft.
        #[arg(long = "clear-at")]
        clear_at: bool,

        #[arg(long = "note", conflicts_with = "clear_note")]
        note: Option<String>,

        #[arg(long = "clear-note")]
        clear_note: bool,
    },

    /// Remove a task entirely.
    Delete { id: String },

    /// Arm reminders for the current tasks and print each notification
    /// as it fires; runs until all have fired or ctrl-c.
    Watch,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
