use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::App;
use crate::model::TaskId;

/// Result of handling a key press.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Submit,
    Remove(TaskId),
    Continue,
}

/// Handle a key press. Returns an action indicating what the event loop should do.
pub fn handle_key(app: &mut App, key: KeyEvent) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }

    // A pending reminder blocks everything else until acknowledged.
    if !app.alerts.is_empty() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
            app.dismiss_alert();
        }
        return KeyAction::Continue;
    }

    if app.add_form.is_some() {
        return handle_add(app, key);
    }

    if app.show_help {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q')) {
            app.toggle_help();
        }
        return KeyAction::Continue;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char('j') | KeyCode::Down => {
            app.list.move_down();
            KeyAction::Continue
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.list.move_up();
            KeyAction::Continue
        }
        KeyCode::Char('a') => {
            app.error = None;
            app.enter_add_mode();
            KeyAction::Continue
        }
        KeyCode::Char('d') | KeyCode::Char('x') | KeyCode::Delete => {
            match app.list.selected_id() {
                Some(id) => KeyAction::Remove(id),
                None => KeyAction::Continue,
            }
        }
        KeyCode::Char('?') => {
            app.toggle_help();
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}

fn handle_add(app: &mut App, key: KeyEvent) -> KeyAction {
    if key.code == KeyCode::Esc {
        app.cancel_add_mode();
        return KeyAction::Continue;
    }
    let Some(form) = app.add_form.as_mut() else {
        return KeyAction::Continue;
    };
    match key.code {
        KeyCode::Tab => {
            form.next_field();
            KeyAction::Continue
        }
        KeyCode::BackTab => {
            form.prev_field();
            KeyAction::Continue
        }
        KeyCode::Enter => KeyAction::Submit,
        KeyCode::Backspace => {
            form.focused_buf_mut().pop();
            KeyAction::Continue
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            form.focused_buf_mut().clear();
            KeyAction::Continue
        }
        KeyCode::Char(c) => {
            form.focused_buf_mut().push(c);
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}
