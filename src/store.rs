use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use log::{debug, warn};

use crate::model::{Task, TaskId};

/// Key every task list is persisted under.
pub const STORAGE_KEY: &str = "studyTasks";

/// Largest id handed out. Ids stay exact when the payload is read back by
/// a JavaScript consumer, where numbers are f64. Larger ids in a payload are
/// treated as missing and replaced.
pub const MAX_ID: u64 = (1 << 53) - 1;

/// Raw key-value medium behind a [`Store`].
pub trait Backend {
    /// Returns `None` when nothing has been stored yet.
    fn read_raw(&self) -> Result<Option<String>>;

    /// Replaces the stored value in a single step.
    fn write_raw(&mut self, raw: &str) -> Result<()>;

    /// Highest id ever handed out for this list, if one was recorded.
    fn read_id_mark(&self) -> Result<Option<u64>>;

    fn write_id_mark(&mut self, mark: u64) -> Result<()>;

    /// Keeps a copy of a payload that could not be fully decoded, before
    /// the store overwrites it.
    fn set_aside(&mut self, raw: &str) -> Result<()>;
}

/// Stores the task list as a JSON file, replaced atomically on every write.
/// The id mark lives beside it in `<stem>.ids`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backend for the well-known `studyTasks.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(format!("{STORAGE_KEY}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id_mark_path(&self) -> PathBuf {
        self.path.with_extension("ids")
    }

    /// `studyTasks.json.corrupt-<timestamp>`
    fn aside_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|f| f.to_os_string())
            .unwrap_or_else(|| OsString::from(STORAGE_KEY));
        name.push(format!(
            ".corrupt-{}",
            Local::now().format("%Y%m%d%H%M%S%.3f")
        ));
        self.path.with_file_name(name)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Writes next to `path` and renames over it so readers never see a
/// half-written file.
fn replace_file(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tasktick-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .context("failed to create temp file")?;
    tmp.write_all(contents.as_bytes())
        .context("failed to write to temp file")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

impl Backend for FileBackend {
    fn read_raw(&self) -> Result<Option<String>> {
        read_optional(&self.path)
    }

    fn write_raw(&mut self, raw: &str) -> Result<()> {
        replace_file(&self.path, raw)
    }

    fn read_id_mark(&self) -> Result<Option<u64>> {
        let path = self.id_mark_path();
        let Some(raw) = read_optional(&path)? else {
            return Ok(None);
        };
        match raw.trim().parse() {
            Ok(mark) => Ok(Some(mark)),
            Err(e) => {
                warn!("ignoring unreadable id mark in {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    fn write_id_mark(&mut self, mark: u64) -> Result<()> {
        replace_file(&self.id_mark_path(), &format!("{mark}\n"))
    }

    fn set_aside(&mut self, raw: &str) -> Result<()> {
        let path = self.aside_path();
        fs::write(&path, raw).with_context(|| format!("failed to write {}", path.display()))?;
        warn!("kept undecodable task data in {}", path.display());
        Ok(())
    }
}

/// In-process backend, used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    raw: Option<String>,
    id_mark: Option<u64>,
    set_aside: Vec<String>,
}

impl MemoryBackend {
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
            ..Self::default()
        }
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn id_mark(&self) -> Option<u64> {
        self.id_mark
    }

    /// Payloads handed to [`Backend::set_aside`], oldest first.
    pub fn set_aside_payloads(&self) -> &[String] {
        &self.set_aside
    }
}

impl Backend for MemoryBackend {
    fn read_raw(&self) -> Result<Option<String>> {
        Ok(self.raw.clone())
    }

    fn write_raw(&mut self, raw: &str) -> Result<()> {
        self.raw = Some(raw.to_string());
        Ok(())
    }

    fn read_id_mark(&self) -> Result<Option<u64>> {
        Ok(self.id_mark)
    }

    fn write_id_mark(&mut self, mark: u64) -> Result<()> {
        self.id_mark = Some(mark);
        Ok(())
    }

    fn set_aside(&mut self, raw: &str) -> Result<()> {
        self.set_aside.push(raw.to_string());
        Ok(())
    }
}

/// Owns the ordered task list and is the only writer of its persisted form.
///
/// Positional operations ([`Store::remove_at`]) act on the sequence the
/// caller last saw through [`Store::tasks`]. Id-addressed operations re-read
/// the backend first so they never clobber tasks written by another process,
/// then resolve the id against that live sequence.
///
/// Ids are never reissued: the highest one handed out is recorded in the
/// backend before the task that carries it is written.
pub struct Store<B: Backend> {
    backend: B,
    tasks: Vec<Task>,
    next_id: u64,
}

impl<B: Backend> Store<B> {
    /// Opens the store and loads whatever is persisted.
    pub fn open(backend: B) -> Self {
        let mut store = Self {
            backend,
            tasks: Vec::new(),
            next_id: 1,
        };
        store.load();
        store
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Replaces the in-memory list with the persisted one. Missing, unreadable
    /// or corrupt data yields an empty list; this never fails. Records that
    /// don't decode are skipped.
    pub fn load(&mut self) {
        let tasks = match self.backend.read_raw() {
            Ok(Some(raw)) => decode(&raw).tasks,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("failed to read task store, starting empty: {e:#}");
                Vec::new()
            }
        };
        let mark = self.backend.read_id_mark().unwrap_or_else(|e| {
            warn!("failed to read id mark: {e:#}");
            None
        });
        self.install(tasks, mark);
    }

    /// Writes the full current list, replacing prior persisted state.
    pub fn save(&mut self) -> Result<()> {
        let tasks = self.tasks.clone();
        self.commit(tasks)
    }

    /// Appends `task` under a freshly assigned id and persists.
    pub fn add(&mut self, mut task: Task) -> Result<TaskId> {
        self.refresh()?;
        if self.next_id > MAX_ID {
            bail!("task ids exhausted");
        }
        task.id = TaskId(self.next_id);
        let id = task.id;
        self.backend.write_id_mark(id.0)?;
        self.next_id += 1;
        let mut tasks = self.tasks.clone();
        tasks.push(task);
        self.commit(tasks)?;
        Ok(id)
    }

    /// Removes the task at `index` of the current list and persists.
    pub fn remove_at(&mut self, index: usize) -> Result<Task> {
        if index >= self.tasks.len() {
            bail!(
                "task index {index} out of range (list has {} task(s))",
                self.tasks.len()
            );
        }
        let mut tasks = self.tasks.clone();
        let removed = tasks.remove(index);
        self.commit(tasks)?;
        Ok(removed)
    }

    /// Removes the task with `id`, wherever it sits in the live list.
    /// Returns `None` if it is already gone.
    pub fn remove(&mut self, id: TaskId) -> Result<Option<Task>> {
        self.refresh()?;
        match self.position(id) {
            Some(index) => self.remove_at(index).map(Some),
            None => Ok(None),
        }
    }

    /// Flips `notified` on for `id` and persists. Returns false when the task
    /// is gone or was already notified, in which case nothing is written.
    pub fn mark_notified(&mut self, id: TaskId) -> Result<bool> {
        self.refresh()?;
        let Some(index) = self.position(id) else {
            return Ok(false);
        };
        if self.tasks[index].notified {
            return Ok(false);
        }
        let mut tasks = self.tasks.clone();
        tasks[index].notified = true;
        self.commit(tasks)?;
        Ok(true)
    }

    /// Re-reads persisted state ahead of a mutation. Unlike [`Store::load`],
    /// read errors propagate so a transient failure can't wipe the file. A
    /// payload with undecodable parts is set aside before anything can
    /// overwrite it.
    fn refresh(&mut self) -> Result<()> {
        let tasks = match self.backend.read_raw()? {
            Some(raw) => {
                let decoded = decode(&raw);
                if decoded.skipped > 0 {
                    self.backend
                        .set_aside(&raw)
                        .context("refusing to overwrite undecodable task data")?;
                }
                decoded.tasks
            }
            None => Vec::new(),
        };
        let mark = self.backend.read_id_mark()?;
        self.install(tasks, mark);
        Ok(())
    }

    /// Persists `tasks`, and only then makes them the visible list.
    fn commit(&mut self, tasks: Vec<Task>) -> Result<()> {
        let raw = encode(&tasks)?;
        self.backend.write_raw(&raw)?;
        self.tasks = tasks;
        debug!("saved {} task(s)", self.tasks.len());
        Ok(())
    }

    /// Ids depend only on the persisted list and mark, so every process
    /// repairs a legacy list the same way.
    fn install(&mut self, mut tasks: Vec<Task>, mark: Option<u64>) {
        let mark = mark.filter(|&m| m <= MAX_ID).unwrap_or(0);
        self.next_id = assign_ids(&mut tasks, mark + 1);
        self.tasks = tasks;
    }
}

/// Gives every task without a usable id (missing, duplicated or above
/// [`MAX_ID`]) a new one, counting up from the highest usable id present or
/// `floor`, whichever is larger. Returns the next free id.
fn assign_ids(tasks: &mut [Task], floor: u64) -> u64 {
    let usable = |id: TaskId| id.is_assigned() && id.0 <= MAX_ID;
    let highest = tasks
        .iter()
        .map(|t| t.id)
        .filter(|&id| usable(id))
        .map(|id| id.0)
        .max()
        .unwrap_or(0);
    let mut next = floor.max(highest.saturating_add(1));
    let mut seen = HashSet::new();
    for task in tasks.iter_mut() {
        if !usable(task.id) || !seen.insert(task.id) {
            task.id = TaskId(next);
            seen.insert(task.id);
            next = next.saturating_add(1);
        }
    }
    next
}

struct Decoded {
    tasks: Vec<Task>,
    /// Records (or a whole payload) that could not be read.
    skipped: usize,
}

/// Decodes record by record, so one bad entry costs only itself.
fn decode(raw: &str) -> Decoded {
    if raw.trim().is_empty() {
        return Decoded {
            tasks: Vec::new(),
            skipped: 0,
        };
    }
    let records: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(records) => records,
        Err(e) => {
            warn!("task store is corrupt, starting empty: {e}");
            return Decoded {
                tasks: Vec::new(),
                skipped: 1,
            };
        }
    };
    let mut tasks = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Task>(record) {
            Ok(task) => tasks.push(task),
            Err(e) => {
                warn!("skipping unreadable task record {index}: {e}");
                skipped += 1;
            }
        }
    }
    Decoded { tasks, skipped }
}

fn encode(tasks: &[Task]) -> Result<String> {
    serde_json::to_string(tasks).context("failed to encode task list")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{parse_date, parse_time};

    fn task(title: &str) -> Task {
        Task::new(
            title,
            parse_date("2024-01-01").unwrap(),
            parse_time("09:00").unwrap(),
        )
    }

    fn reloaded(store: &Store<MemoryBackend>) -> Vec<Task> {
        Store::open(store.backend().clone()).tasks().to_vec()
    }

    #[test]
    fn add_persists_and_reloads() {
        let mut store = Store::open(MemoryBackend::default());
        store.add(task("Read Ch.1")).unwrap();

        let tasks = reloaded(&store);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Read Ch.1");
        assert_eq!(tasks[0].date_str(), "2024-01-01");
        assert_eq!(tasks[0].time_str(), "09:00");
        assert!(!tasks[0].notified);
    }

    #[test]
    fn every_mutation_round_trips() {
        let mut store = Store::open(MemoryBackend::default());
        for name in ["a", "b", "c", "d"] {
            store.add(task(name)).unwrap();
            assert_eq!(reloaded(&store), store.tasks());
        }
        store.remove_at(1).unwrap();
        assert_eq!(reloaded(&store), store.tasks());
        let id = store.tasks()[0].id;
        store.mark_notified(id).unwrap();
        assert_eq!(reloaded(&store), store.tasks());
        store.remove(id).unwrap();
        assert_eq!(reloaded(&store), store.tasks());
    }

    #[test]
    fn remove_at_shifts_later_tasks_down() {
        let mut store = Store::open(MemoryBackend::default());
        store.add(task("first")).unwrap();
        store.add(task("second")).unwrap();
        let removed = store.remove_at(0).unwrap();
        assert_eq!(removed.title, "first");
        assert_eq!(store.len(), 1);
        assert_eq!(store.tasks()[0].title, "second");
    }

    #[test]
    fn remove_at_out_of_range_fails_without_writing() {
        let mut store = Store::open(MemoryBackend::default());
        store.add(task("only")).unwrap();
        let before = store.backend().raw().map(str::to_string);
        assert!(store.remove_at(1).is_err());
        assert_eq!(store.backend().raw().map(str::to_string), before);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn garbage_loads_as_empty() {
        let store = Store::open(MemoryBackend::with_raw("not json {{"));
        assert!(store.is_empty());
    }

    #[test]
    fn wrong_shape_loads_as_empty() {
        let store = Store::open(MemoryBackend::with_raw(r#"{"title":"x"}"#));
        assert!(store.is_empty());
    }

    #[test]
    fn missing_ids_are_assigned_in_order() {
        let raw = r#"[
            {"title":"a","time":"09:00","date":"2024-01-01","notified":false},
            {"title":"b","time":"10:00","date":"2024-01-01","notified":false,"id":7},
            {"title":"c","time":"11:00","date":"2024-01-01","notified":true,"id":7}
        ]"#;
        let store = Store::open(MemoryBackend::with_raw(raw));
        let ids: Vec<u64> = store.tasks().iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![8, 7, 9]);
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut store = Store::open(MemoryBackend::default());
        store.add(task("a")).unwrap();
        let b = store.add(task("b")).unwrap();
        store.remove(b).unwrap();
        let c = store.add(task("c")).unwrap();
        assert_ne!(b, c);
    }

    #[test]
    fn removed_highest_id_is_not_reissued_by_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let open = || Store::open(FileBackend::in_dir(dir.path()));
        open().add(task("a")).unwrap();
        let b = open().add(task("b")).unwrap();
        open().remove(b).unwrap();

        let c = open().add(task("c")).unwrap();
        assert!(c > b);
        assert_eq!(
            fs::read_to_string(FileBackend::in_dir(dir.path()).id_mark_path()).unwrap(),
            format!("{c}\n")
        );
    }

    #[test]
    fn out_of_range_id_is_replaced_instead_of_overflowing() {
        let raw = format!(
            r#"[{{"title":"a","time":"09:00","date":"2024-01-01","id":{}}},
                {{"title":"b","time":"10:00","date":"2024-01-01","id":3}}]"#,
            u64::MAX
        );
        let mut store = Store::open(MemoryBackend::with_raw(raw));
        let ids: Vec<u64> = store.tasks().iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![4, 3]);

        let next = store.add(task("c")).unwrap();
        assert_eq!(next, TaskId(5));
    }

    #[test]
    fn oversized_id_mark_is_ignored() {
        let mut backend = MemoryBackend::default();
        backend.write_id_mark(u64::MAX).unwrap();
        let mut store = Store::open(backend);
        assert_eq!(store.add(task("a")).unwrap(), TaskId(1));
    }

    #[test]
    fn unreadable_record_is_skipped_and_set_aside() {
        let raw = r#"[
            {"title":"keep","time":"09:00","date":"2024-01-01","notified":false,"id":1},
            {"title":"broken","time":"9 o'clock","date":"2024-01-01","notified":false,"id":2}
        ]"#;
        let mut store = Store::open(MemoryBackend::with_raw(raw));
        assert_eq!(store.len(), 1);
        assert_eq!(store.tasks()[0].title, "keep");
        assert!(store.backend().set_aside_payloads().is_empty());

        store.add(task("new")).unwrap();
        let titles: Vec<String> = reloaded(&store).into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["keep", "new"]);
        assert_eq!(store.backend().set_aside_payloads(), [raw.to_string()]);
    }

    #[test]
    fn corrupt_file_is_copied_aside_before_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studyTasks.json");
        fs::write(&path, "not json {{").unwrap();

        let mut store = Store::open(FileBackend::new(&path));
        assert!(store.is_empty());
        store.add(task("fresh")).unwrap();

        let kept: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("studyTasks.json.corrupt-"))
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join(&kept[0])).unwrap(),
            "not json {{"
        );
    }

    #[test]
    fn save_persists_repaired_ids() {
        let raw = r#"[{"title":"legacy","time":"09:00","date":"2024-01-01","notified":false}]"#;
        let mut store = Store::open(MemoryBackend::with_raw(raw));
        store.save().unwrap();
        let written: serde_json::Value =
            serde_json::from_str(store.backend().raw().unwrap()).unwrap();
        assert_eq!(written[0]["id"], 1);
        assert_eq!(reloaded(&store), store.tasks());
    }

    #[test]
    fn remove_by_id_tracks_shifted_position() {
        let mut store = Store::open(MemoryBackend::default());
        let a = store.add(task("a")).unwrap();
        let b = store.add(task("b")).unwrap();
        let c = store.add(task("c")).unwrap();
        store.remove(a).unwrap();

        // `c` used to sit at index 2; it must still be found at index 1.
        let removed = store.remove(c).unwrap().unwrap();
        assert_eq!(removed.title, "c");
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.tasks()[0].id, b);
        assert!(store.remove(c).unwrap().is_none());
    }

    #[test]
    fn mark_notified_is_one_way() {
        let mut store = Store::open(MemoryBackend::default());
        let id = store.add(task("a")).unwrap();
        assert!(store.mark_notified(id).unwrap());
        assert!(!store.mark_notified(id).unwrap());
        assert!(store.get(id).unwrap().notified);
        assert!(!store.mark_notified(TaskId(999)).unwrap());
    }

    #[test]
    fn add_keeps_tasks_written_by_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = Store::open(FileBackend::in_dir(dir.path()));
        let mut second = Store::open(FileBackend::in_dir(dir.path()));
        first.add(task("from first")).unwrap();
        second.add(task("from second")).unwrap();

        let titles: Vec<String> = Store::open(FileBackend::in_dir(dir.path()))
            .tasks()
            .iter()
            .map(|t| t.title.clone())
            .collect();
        assert_eq!(titles, vec!["from first", "from second"]);
    }

    #[test]
    fn file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::in_dir(&dir.path().join("nested"));
        assert!(backend.read_raw().unwrap().is_none());
        backend.write_raw("[]").unwrap();
        assert_eq!(backend.read_raw().unwrap().as_deref(), Some("[]"));
        assert!(backend.path().ends_with("studyTasks.json"));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(FileBackend::in_dir(dir.path()));
        assert!(store.is_empty());
    }
}
