use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use log::{error, info};

use crate::controller::Render;
use crate::model::{Task, TaskId};
use crate::notifier::{Delivery, Notifier};
use crate::store::{Backend, Store};

/// Tasks that should fire at `now`, in list order.
pub fn due_tasks(tasks: &[Task], now: NaiveDateTime) -> Vec<&Task> {
    tasks.iter().filter(|t| t.is_due(now)).collect()
}

/// Earliest due moment among tasks that haven't fired yet.
pub fn next_due(tasks: &[Task]) -> Option<NaiveDateTime> {
    tasks
        .iter()
        .filter(|t| !t.notified)
        .map(Task::due_at)
        .min()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired {
    pub id: TaskId,
    pub title: String,
    pub delivery: Delivery,
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub fired: Vec<Fired>,
}

/// Periodic due-check. Each due task is marked notified before its alert is
/// delivered, so a reminder fires at most once even when several processes
/// share the store or a delivery channel fails.
pub struct Scheduler {
    interval: Duration,
    last_tick: Option<Instant>,
    /// Reminders delivered although their notified flag could not be saved.
    /// Keyed on what was delivered, not only the id, so a different task
    /// that later turns up under the same id still fires.
    unsaved: HashSet<Delivered>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Delivered {
    id: TaskId,
    due_at: NaiveDateTime,
    title: String,
}

impl Delivered {
    fn of(task: &Task) -> Self {
        Self {
            id: task.id,
            due_at: task.due_at(),
            title: task.title.clone(),
        }
    }
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_tick: None,
            unsaved: HashSet::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a tick is owed at `now`. The first check is always ready.
    pub fn ready(&self, now: Instant) -> bool {
        match self.last_tick {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        }
    }

    /// How long an event loop may sleep before the next tick is owed.
    pub fn until_next(&self, now: Instant) -> Duration {
        match self.last_tick {
            None => Duration::ZERO,
            Some(last) => (last + self.interval).saturating_duration_since(now),
        }
    }

    /// Runs one due-check against `store` as of wall-clock `now`.
    pub fn tick<B: Backend>(
        &mut self,
        store: &mut Store<B>,
        notifier: &mut Notifier,
        render: &mut dyn Render,
        now: NaiveDateTime,
    ) -> TickReport {
        self.last_tick = Some(Instant::now());
        let due: Vec<Delivered> = due_tasks(store.tasks(), now)
            .into_iter()
            .map(Delivered::of)
            .filter(|d| !self.unsaved.contains(d))
            .collect();

        let mut report = TickReport::default();
        for task in due {
            let id = task.id;
            match store.mark_notified(id) {
                Ok(true) => {}
                // Removed, or already handled by another process since we
                // last read the store.
                Ok(false) => continue,
                Err(e) => {
                    error!("failed to persist notified flag for task {id}: {e:#}");
                    self.unsaved.insert(task.clone());
                }
            }
            render.render(store.tasks());

            info!("task {id} is due: {}", task.title);
            let delivery = notifier.notify(&task.title);
            report.fired.push(Fired {
                id,
                title: task.title,
                delivery,
            });
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use anyhow::Result;
    use chrono::{Duration as ChronoDuration, NaiveDate};

    use super::*;
    use crate::controller::NoRender;
    use crate::model::{parse_date, parse_time};
    use crate::notifier::{Alert, Outcome, Permission, SystemNotifications};
    use crate::store::{FileBackend, MemoryBackend};

    struct NoSystem;

    impl SystemNotifications for NoSystem {
        fn is_supported(&self) -> bool {
            false
        }
        fn request_permission(&mut self) -> Permission {
            Permission::Denied
        }
        fn permission(&self) -> Permission {
            Permission::Denied
        }
        fn show(&mut self, _title: &str, _body: &str) -> Result<()> {
            Ok(())
        }
    }

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Alert for Recorder {
        fn alert(&mut self, message: &str) -> Result<()> {
            self.0.borrow_mut().push(message.to_string());
            Ok(())
        }
    }

    fn notifier() -> (Notifier, Rc<RefCell<Vec<String>>>) {
        let alerts = Rc::new(RefCell::new(Vec::new()));
        let n = Notifier::new(None, Box::new(NoSystem), Box::new(Recorder(alerts.clone())));
        (n, alerts)
    }

    fn at(date: &str, time: &str) -> NaiveDateTime {
        parse_date(date).unwrap().and_time(parse_time(time).unwrap())
    }

    fn task(title: &str, due: NaiveDateTime) -> Task {
        Task::new(title, due.date(), due.time())
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(Duration::from_secs(15))
    }

    #[test]
    fn past_due_task_fires_once() {
        let now = at("2024-05-01", "12:00");
        let mut store = Store::open(MemoryBackend::default());
        store.add(task("late", now - ChronoDuration::minutes(1))).unwrap();
        let (mut n, alerts) = notifier();
        let mut sched = scheduler();

        let report = sched.tick(&mut store, &mut n, &mut NoRender, now);
        assert_eq!(report.fired.len(), 1);
        assert!(store.tasks()[0].notified);
        assert_eq!(*alerts.borrow(), vec!["Reminder: late"]);

        let report = sched.tick(&mut store, &mut n, &mut NoRender, now + ChronoDuration::hours(1));
        assert!(report.fired.is_empty());
        assert_eq!(alerts.borrow().len(), 1);
    }

    #[test]
    fn never_fires_early() {
        let due = at("2024-05-01", "12:00");
        let mut store = Store::open(MemoryBackend::default());
        store.add(task("soon", due)).unwrap();
        let (mut n, alerts) = notifier();
        let mut sched = scheduler();

        sched.tick(&mut store, &mut n, &mut NoRender, due - ChronoDuration::seconds(1));
        assert!(alerts.borrow().is_empty());
        assert!(!store.tasks()[0].notified);

        sched.tick(&mut store, &mut n, &mut NoRender, due);
        assert_eq!(alerts.borrow().len(), 1);
    }

    #[test]
    fn simultaneous_tasks_fire_in_list_order() {
        let now = at("2024-05-01", "12:00");
        let mut store = Store::open(MemoryBackend::default());
        store.add(task("b", now)).unwrap();
        store.add(task("future", now + ChronoDuration::minutes(5))).unwrap();
        store.add(task("a", now - ChronoDuration::days(2))).unwrap();
        let (mut n, alerts) = notifier();
        let mut renders = 0;
        let mut render = |_: &[Task]| renders += 1;

        let report = scheduler().tick(&mut store, &mut n, &mut render, now);
        let titles: Vec<&str> = report.fired.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "a"]);
        assert_eq!(*alerts.borrow(), vec!["Reminder: b", "Reminder: a"]);
        assert_eq!(renders, 2);
        assert!(!store.tasks()[1].notified);
    }

    #[test]
    fn notified_flag_is_persisted() {
        let now = at("2024-05-01", "12:00");
        let mut store = Store::open(MemoryBackend::default());
        store.add(task("x", now)).unwrap();
        let (mut n, _) = notifier();
        scheduler().tick(&mut store, &mut n, &mut NoRender, now);

        let reloaded = Store::open(store.backend().clone());
        assert!(reloaded.tasks()[0].notified);
    }

    #[test]
    fn task_notified_by_another_process_is_not_redelivered() {
        let dir = tempfile::tempdir().unwrap();
        let now = at("2024-05-01", "12:00");
        let mut first = Store::open(FileBackend::in_dir(dir.path()));
        first.add(task("shared", now)).unwrap();

        // Loaded before `first` fires, so its in-memory copy is still pending.
        let mut second = Store::open(FileBackend::in_dir(dir.path()));
        assert!(!second.tasks()[0].notified);

        let (mut n1, alerts1) = notifier();
        let (mut n2, alerts2) = notifier();
        scheduler().tick(&mut first, &mut n1, &mut NoRender, now);
        let report = scheduler().tick(&mut second, &mut n2, &mut NoRender, now);

        assert_eq!(alerts1.borrow().len(), 1);
        assert!(report.fired.is_empty());
        assert!(alerts2.borrow().is_empty());
        assert!(second.tasks()[0].notified);
    }

    struct BrokenAlert;

    impl Alert for BrokenAlert {
        fn alert(&mut self, _message: &str) -> Result<()> {
            anyhow::bail!("no display")
        }
    }

    /// Reads like the wrapped backend but refuses to write the task list.
    struct ReadOnly(MemoryBackend);

    impl Backend for ReadOnly {
        fn read_raw(&self) -> Result<Option<String>> {
            self.0.read_raw()
        }
        fn write_raw(&mut self, _raw: &str) -> Result<()> {
            anyhow::bail!("disk full")
        }
        fn read_id_mark(&self) -> Result<Option<u64>> {
            self.0.read_id_mark()
        }
        fn write_id_mark(&mut self, mark: u64) -> Result<()> {
            self.0.write_id_mark(mark)
        }
        fn set_aside(&mut self, raw: &str) -> Result<()> {
            self.0.set_aside(raw)
        }
    }

    #[test]
    fn failed_delivery_still_marks_notified() {
        let now = at("2024-05-01", "12:00");
        let mut store = Store::open(MemoryBackend::default());
        store.add(task("quiz", now)).unwrap();
        let mut n = Notifier::new(None, Box::new(NoSystem), Box::new(BrokenAlert));
        let mut sched = scheduler();

        let report = sched.tick(&mut store, &mut n, &mut NoRender, now);
        assert_eq!(report.fired.len(), 1);
        assert!(matches!(report.fired[0].delivery.alert, Outcome::Failed(_)));
        assert!(!report.fired[0].delivery.visible());
        assert!(Store::open(store.backend().clone()).tasks()[0].notified);

        // No retry.
        let report = sched.tick(&mut store, &mut n, &mut NoRender, now + ChronoDuration::minutes(1));
        assert!(report.fired.is_empty());
    }

    #[test]
    fn unsaved_flag_does_not_repeat_within_session() {
        let now = at("2024-05-01", "12:00");
        let mut seed = Store::open(MemoryBackend::default());
        seed.add(task("essay", now)).unwrap();
        let mut store = Store::open(ReadOnly(seed.backend().clone()));
        let (mut n, alerts) = notifier();
        let mut sched = scheduler();

        let report = sched.tick(&mut store, &mut n, &mut NoRender, now);
        assert_eq!(report.fired.len(), 1);
        assert!(!store.tasks()[0].notified);

        let report = sched.tick(&mut store, &mut n, &mut NoRender, now + ChronoDuration::minutes(1));
        assert!(report.fired.is_empty());
        assert_eq!(*alerts.borrow(), vec!["Reminder: essay"]);
    }

    #[test]
    fn long_running_session_sees_tasks_added_after_a_removal() {
        let dir = tempfile::tempdir().unwrap();
        let now = at("2024-05-01", "12:00");
        let cli = || Store::open(FileBackend::in_dir(dir.path()));

        let mut daemon = cli();
        cli().add(task("a", now)).unwrap();
        let b = cli().add(task("b", now)).unwrap();
        let (mut n, alerts) = notifier();
        let mut sched = scheduler();
        daemon.load();
        assert_eq!(sched.tick(&mut daemon, &mut n, &mut NoRender, now).fired.len(), 2);

        cli().remove(b).unwrap();
        let c = cli().add(task("c", now)).unwrap();
        assert_ne!(c, b);

        daemon.load();
        let report = sched.tick(&mut daemon, &mut n, &mut NoRender, now + ChronoDuration::minutes(1));
        assert_eq!(report.fired.len(), 1);
        assert_eq!(report.fired[0].id, c);
        assert_eq!(
            *alerts.borrow(),
            vec!["Reminder: a", "Reminder: b", "Reminder: c"]
        );
    }

    #[test]
    fn next_due_ignores_notified() {
        let base = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut early = task("early", base);
        early.notified = true;
        let tasks = vec![
            early,
            task("late", base + ChronoDuration::hours(3)),
            task("mid", base + ChronoDuration::hours(1)),
        ];
        assert_eq!(next_due(&tasks), Some(base + ChronoDuration::hours(1)));
        assert_eq!(due_tasks(&tasks, base + ChronoDuration::hours(2)).len(), 1);
        assert!(next_due(&[]).is_none());
    }

    #[test]
    fn tick_timing() {
        let mut sched = scheduler();
        let start = Instant::now();
        assert!(sched.ready(start));
        assert_eq!(sched.until_next(start), Duration::ZERO);

        let mut store = Store::open(MemoryBackend::default());
        let (mut n, _) = notifier();
        sched.tick(&mut store, &mut n, &mut NoRender, at("2024-05-01", "12:00"));
        let after = Instant::now();
        assert!(!sched.ready(after));
        assert!(sched.until_next(after) <= Duration::from_secs(15));
        assert!(sched.ready(after + Duration::from_secs(15)));
    }
}
