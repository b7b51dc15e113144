mod cli;

use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use log::info;

use cli::{Cli, Command};
use tasktick::config::Config;
use tasktick::controller::{self, NoRender, Submission, TaskForm};
use tasktick::daemon::Daemon;
use tasktick::model::TaskId;
use tasktick::notifier::{ChannelAlert, Notifier, PrintAlert};
use tasktick::output;
use tasktick::paths;
use tasktick::scheduler::Scheduler;
use tasktick::store::{FileBackend, Store};

const LOG_ENV: &str = "TASKTICK_LOG";

/// Long-running commands own the terminal (or run unattended), so they log
/// to a file. Everything else logs warnings to stderr.
fn setup_logging(to_file: bool) -> Result<()> {
    let env = env_logger::Env::default();
    let mut builder = if to_file {
        let log_path = paths::log_path();
        if let Some(dir) = log_path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .context("failed to open log file")?;
        let mut builder = env_logger::Builder::from_env(env.filter_or(LOG_ENV, "info"));
        builder.target(env_logger::Target::Pipe(Box::new(file)));
        builder
    } else {
        env_logger::Builder::from_env(env.filter_or(LOG_ENV, "warn"))
    };
    builder.format_timestamp_secs().init();
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(matches!(cli.command, Command::Run | Command::Tui { .. }))?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let store_path = cli.store.unwrap_or_else(paths::store_path);
    let mut store = Store::open(FileBackend::new(store_path));

    match cli.command {
        Command::Add {
            title,
            time,
            date,
            json,
        } => {
            let mut form = TaskForm::new(title, time, date);
            match controller::submit_task(&mut store, &mut form, &mut NoRender)? {
                Submission::Added(id) => {
                    let task = store
                        .get(id)
                        .with_context(|| format!("task {id} missing after add"))?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(task)?);
                    } else {
                        eprintln!("Added task {id} ({})", output::format_when(task));
                    }
                }
                Submission::Rejected(rejection) => bail!("{rejection}"),
            }
        }
        Command::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(store.tasks())?);
            } else {
                let mut out = io::stdout().lock();
                write!(out, "{}", output::format_task_list(store.tasks()))?;
            }
        }
        Command::Rm { id } => {
            let id = TaskId(id);
            match controller::request_remove(&mut store, id, &mut NoRender)? {
                Some(task) => eprintln!("Removed task {id} ({})", task.title),
                None => bail!("task {id} not found"),
            }
        }
        Command::Check => {
            let mut scheduler = Scheduler::new(config.scheduler.tick_interval());
            let mut notifier = Notifier::from_config(&config.notify, Box::new(PrintAlert))?;
            let now = Local::now().naive_local();
            let report = scheduler.tick(&mut store, &mut notifier, &mut NoRender, now);
            eprintln!("{} reminder(s) delivered", report.fired.len());
        }
        Command::Run => {
            let running = Arc::new(AtomicBool::new(true));
            let r = running.clone();
            ctrlc::set_handler(move || {
                r.store(false, Ordering::SeqCst);
            })
            .context("failed to set signal handler")?;

            let scheduler = Scheduler::new(config.scheduler.tick_interval());
            let notifier = Notifier::from_config(&config.notify, Box::new(PrintAlert))?;
            info!(
                "reminders every {}s",
                config.scheduler.tick_interval().as_secs()
            );
            Daemon::new(store, scheduler, notifier, running).run()?;
        }
        Command::Tui { poll_interval } => {
            let (tx, rx) = mpsc::channel();
            let mut scheduler = Scheduler::new(config.scheduler.tick_interval());
            let mut notifier = Notifier::from_config(&config.notify, Box::new(ChannelAlert(tx)))?;
            tasktick::tui::run(
                &mut store,
                &mut scheduler,
                &mut notifier,
                &rx,
                poll_interval,
            )?;
        }
    }

    Ok(())
}
