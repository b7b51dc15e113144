use anyhow::Result;
use log::{debug, info};

use crate::model::{Task, TaskId};
use crate::store::{Backend, Store};
use crate::validate::{self, Rejection};

/// Redraws the task list after a mutation.
pub trait Render {
    fn render(&mut self, tasks: &[Task]);
}

impl<F: FnMut(&[Task])> Render for F {
    fn render(&mut self, tasks: &[Task]) {
        self(tasks)
    }
}

/// Render target for callers that don't display anything.
pub struct NoRender;

impl Render for NoRender {
    fn render(&mut self, _tasks: &[Task]) {}
}

/// Raw input for a new task, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub time: String,
    pub date: String,
}

impl TaskForm {
    pub fn new(
        title: impl Into<String>,
        time: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            time: time.into(),
            date: date.into(),
        }
    }

    pub fn clear(&mut self) {
        self.title.clear();
        self.time.clear();
        self.date.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Added(TaskId),
    Rejected(Rejection),
}

/// Turns a form into a task. Incomplete or malformed input is dropped
/// without touching the store or the form; the reason is only returned.
pub fn submit_task<B: Backend>(
    store: &mut Store<B>,
    form: &mut TaskForm,
    render: &mut dyn Render,
) -> Result<Submission> {
    let fields = match validate::task_fields(&form.title, &form.time, &form.date) {
        Ok(fields) => fields,
        Err(rejection) => {
            debug!("ignoring submission: {rejection}");
            return Ok(Submission::Rejected(rejection));
        }
    };
    let id = store.add(Task::new(fields.title, fields.date, fields.time))?;
    info!("added task {id}");
    form.clear();
    render.render(store.tasks());
    Ok(Submission::Added(id))
}

/// Removes the task a removal control points at. The control carries the
/// task's id, and its position is looked up in the live list only now, so a
/// list that changed since it was drawn can't misdirect the removal.
pub fn request_remove<B: Backend>(
    store: &mut Store<B>,
    id: TaskId,
    render: &mut dyn Render,
) -> Result<Option<Task>> {
    let removed = store.remove(id)?;
    match &removed {
        Some(task) => info!("removed task {id} ({})", task.title),
        None => debug!("task {id} already gone"),
    }
    render.render(store.tasks());
    Ok(removed)
}
