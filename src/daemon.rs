use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use log::{debug, info};

use crate::model::Task;
use crate::notifier::Notifier;
use crate::scheduler::Scheduler;
use crate::store::{FileBackend, Store};
use crate::watch;

/// Upper bound on one wait, so a shutdown request is noticed promptly.
const MAX_WAIT: Duration = Duration::from_secs(1);

/// Headless reminder loop: reloads the store when another process changes
/// it and runs the scheduler on its interval until `running` is cleared.
pub struct Daemon {
    store: Store<FileBackend>,
    scheduler: Scheduler,
    notifier: Notifier,
    running: Arc<AtomicBool>,
}

impl Daemon {
    pub fn new(
        store: Store<FileBackend>,
        scheduler: Scheduler,
        notifier: Notifier,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            scheduler,
            notifier,
            running,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let (_watcher, rx) = watch::watch_store(self.store.backend().path())?;
        info!(
            "watching {} ({} task(s), tick every {}s)",
            self.store.backend().path().display(),
            self.store.len(),
            self.scheduler.interval().as_secs()
        );

        while self.running.load(Ordering::SeqCst) {
            if self.scheduler.ready(Instant::now()) {
                let now = Local::now().naive_local();
                let report =
                    self.scheduler
                        .tick(&mut self.store, &mut self.notifier, &mut log_render, now);
                for fired in &report.fired {
                    debug!("delivery for task {}: {:?}", fired.id, fired.delivery);
                }
            }

            let wait = self.scheduler.until_next(Instant::now()).min(MAX_WAIT);
            if watch::wait_for_change(&rx, wait) {
                watch::drain_events(&rx);
                self.store.load();
                debug!("store changed on disk, {} task(s)", self.store.len());
            }
        }

        info!("stopped");
        Ok(())
    }
}

fn log_render(tasks: &[Task]) {
    let pending = tasks.iter().filter(|t| !t.notified).count();
    info!("{} task(s), {pending} pending", tasks.len());
}
