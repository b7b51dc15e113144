use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tasktick", about = "Study task reminders for the terminal")]
pub struct Cli {
    /// Path to the task store [default: ~/.tasktick/studyTasks.json]
    #[arg(long, env = "TASKTICK_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Path to the config file [default: ~/.tasktick/config.toml]
    #[arg(long, env = "TASKTICK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add a task
    Add {
        /// What to study
        title: String,
        /// Reminder time (HH:MM, 24-hour)
        #[arg(short, long)]
        time: String,
        /// Reminder date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
        /// Print the stored task as JSON
        #[arg(long)]
        json: bool,
    },

    /// List tasks in stored order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a task
    Rm {
        /// Task id, as shown by `list`
        id: u64,
    },

    /// Deliver reminders for every task that is due now, then exit
    Check,

    /// Watch the store and deliver reminders until interrupted
    Run,

    /// Interactive task list with live reminders
    Tui {
        /// Input poll interval in milliseconds
        #[arg(long, default_value_t = 250)]
        poll_interval: u64,
    },
}
