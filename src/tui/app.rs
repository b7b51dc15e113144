use std::collections::VecDeque;

use chrono::Local;
use ratatui::widgets::ListState;

use crate::controller::{Render, TaskForm};
use crate::model::{Task, TaskId, DATE_FORMAT};

/// The rendered task list. Rows are a snapshot taken at the last render.
pub struct ListView {
    pub rows: Vec<Task>,
    pub list_state: ListState,
}

impl ListView {
    pub fn new(tasks: &[Task]) -> Self {
        let mut view = Self {
            rows: Vec::new(),
            list_state: ListState::default(),
        };
        view.render(tasks);
        view
    }

    pub fn cursor(&self) -> usize {
        self.list_state.selected().unwrap_or(0)
    }

    pub fn move_up(&mut self) {
        let cursor = self.cursor();
        if cursor > 0 {
            self.list_state.select(Some(cursor - 1));
        }
    }

    pub fn move_down(&mut self) {
        let cursor = self.cursor();
        if !self.rows.is_empty() && cursor < self.rows.len() - 1 {
            self.list_state.select(Some(cursor + 1));
        }
    }

    /// Id of the highlighted task. Removal goes through the id, never the
    /// row index, since the list may change before the id is used.
    pub fn selected_id(&self) -> Option<TaskId> {
        self.rows.get(self.cursor()).map(|t| t.id)
    }
}

impl Render for ListView {
    fn render(&mut self, tasks: &[Task]) {
        // Keep the highlight on the same task if it survived.
        let selected = self.selected_id();
        self.rows = tasks.to_vec();
        let cursor = selected
            .and_then(|id| self.rows.iter().position(|t| t.id == id))
            .unwrap_or_else(|| self.cursor().min(self.rows.len().saturating_sub(1)));
        self.list_state
            .select(if self.rows.is_empty() { None } else { Some(cursor) });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddField {
    Title,
    Time,
    Date,
}

pub struct AddForm {
    pub input: TaskForm,
    pub focused: AddField,
}

impl AddForm {
    /// Starts with today's date filled in.
    pub fn new() -> Self {
        let today = Local::now().date_naive().format(DATE_FORMAT).to_string();
        Self {
            input: TaskForm::new("", "", today),
            focused: AddField::Title,
        }
    }

    pub fn focused_buf_mut(&mut self) -> &mut String {
        match self.focused {
            AddField::Title => &mut self.input.title,
            AddField::Time => &mut self.input.time,
            AddField::Date => &mut self.input.date,
        }
    }

    pub fn next_field(&mut self) {
        self.focused = match self.focused {
            AddField::Title => AddField::Time,
            AddField::Time => AddField::Date,
            AddField::Date => AddField::Title,
        };
    }

    pub fn prev_field(&mut self) {
        self.focused = match self.focused {
            AddField::Title => AddField::Date,
            AddField::Time => AddField::Title,
            AddField::Date => AddField::Time,
        };
    }
}

pub struct App {
    pub list: ListView,
    pub add_form: Option<AddForm>,
    /// Fallback reminders waiting to be acknowledged, oldest first.
    pub alerts: VecDeque<String>,
    pub show_help: bool,
    pub error: Option<String>,
}

impl App {
    pub fn new(tasks: &[Task]) -> Self {
        Self {
            list: ListView::new(tasks),
            add_form: None,
            alerts: VecDeque::new(),
            show_help: false,
            error: None,
        }
    }

    pub fn enter_add_mode(&mut self) {
        self.add_form = Some(AddForm::new());
    }

    pub fn cancel_add_mode(&mut self) {
        self.add_form = None;
    }

    pub fn push_alert(&mut self, message: String) {
        self.alerts.push_back(message);
    }

    pub fn dismiss_alert(&mut self) {
        self.alerts.pop_front();
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }
}
