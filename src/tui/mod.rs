mod app;
mod event;
mod list;

use std::io;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use crossterm::event::{self as ct_event, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use log::{debug, info};
use ratatui::prelude::*;

use crate::controller::{self, Submission};
use crate::notifier::Notifier;
use crate::scheduler::Scheduler;
use crate::store::{FileBackend, Store};
use crate::watch;
use app::App;
use event::KeyAction;

/// Interactive session. Key presses, scheduler ticks and store reloads are
/// all handled on this one loop, so no two mutations ever interleave.
/// `alerts` receives fallback reminders from `notifier`.
pub fn run(
    store: &mut Store<FileBackend>,
    scheduler: &mut Scheduler,
    notifier: &mut Notifier,
    alerts: &Receiver<String>,
    poll_interval: u64,
) -> Result<()> {
    let mut app = App::new(store.tasks());

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(
        &mut terminal,
        &mut app,
        store,
        scheduler,
        notifier,
        alerts,
        poll_interval,
    );

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    store: &mut Store<FileBackend>,
    scheduler: &mut Scheduler,
    notifier: &mut Notifier,
    alerts: &Receiver<String>,
    poll_interval: u64,
) -> Result<()> {
    let poll_duration = Duration::from_millis(poll_interval);

    let (_watcher, rx) = watch::watch_store(store.backend().path())?;
    info!("tui started with {} task(s)", store.len());

    loop {
        if scheduler.ready(Instant::now()) {
            let now = Local::now().naive_local();
            let report = scheduler.tick(store, notifier, &mut app.list, now);
            if !report.fired.is_empty() {
                debug!("{} reminder(s) fired", report.fired.len());
            }
        }
        while let Ok(message) = alerts.try_recv() {
            app.push_alert(message);
        }

        terminal.draw(|frame| list::render(frame, app))?;

        let timeout = poll_duration.min(scheduler.until_next(Instant::now()));
        if ct_event::poll(timeout)? {
            if let Event::Key(key) = ct_event::read()? {
                if key.kind == KeyEventKind::Press {
                    match event::handle_key(app, key) {
                        KeyAction::Quit => return Ok(()),
                        KeyAction::Submit => submit(app, store),
                        KeyAction::Remove(id) => {
                            app.error = None;
                            if let Err(e) = controller::request_remove(store, id, &mut app.list)
                            {
                                app.error = Some(format!("{e:#}"));
                            }
                        }
                        KeyAction::Continue => {}
                    }
                }
            }
        }

        // Check for changes made by other processes (non-blocking)
        if watch::wait_for_change(&rx, Duration::ZERO) {
            watch::drain_events(&rx);
            store.load();
            controller::Render::render(&mut app.list, store.tasks());
        }
    }
}

/// Incomplete input leaves the dialog open with nothing reported.
fn submit(app: &mut App, store: &mut Store<FileBackend>) {
    let Some(form) = app.add_form.as_mut() else {
        return;
    };
    match controller::submit_task(store, &mut form.input, &mut app.list) {
        Ok(Submission::Added(_)) => {
            app.add_form = None;
            app.error = None;
        }
        Ok(Submission::Rejected(_)) => {}
        Err(e) => app.error = Some(format!("{e:#}")),
    }
}
