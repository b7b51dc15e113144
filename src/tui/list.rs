use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};

use super::app::{AddField, App};
use crate::model::{Task, DATE_FORMAT, TIME_FORMAT};
use crate::output::{self, EMPTY_LIST};
use crate::scheduler;

pub fn render(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());
    render_list(frame, app, chunks[0]);
    render_footer(frame, app, chunks[1]);

    if app.show_help {
        render_help(frame);
    }
    if app.add_form.is_some() {
        render_add_dialog(frame, app);
    }
    if let Some(message) = app.alerts.front() {
        render_alert(frame, message, app.alerts.len());
    }
}

fn task_item(task: &Task) -> ListItem<'static> {
    let (icon_style, title_style) = if task.notified {
        (
            Style::default().fg(Color::DarkGray),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        (Style::default().fg(Color::Green), Style::default().bold())
    };
    ListItem::new(Line::from(vec![
        Span::styled(format!("{} ", task.icon()), icon_style),
        Span::styled(task.title.clone(), title_style),
        Span::styled(
            format!("  {}", output::format_when(task)),
            Style::default().fg(Color::Cyan),
        ),
    ]))
}

fn render_list(frame: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Tasks ");
    if app.list.rows.is_empty() {
        frame.render_widget(
            Paragraph::new(EMPTY_LIST)
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    }

    let items: Vec<ListItem> = app.list.rows.iter().map(task_item).collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray));
    frame.render_stateful_widget(list, area, &mut app.list.list_state);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(err) = &app.error {
        frame.render_widget(
            Paragraph::new(err.as_str()).style(Style::default().fg(Color::Red)),
            area,
        );
        return;
    }
    let next = match scheduler::next_due(&app.list.rows) {
        Some(due) => format!(
            "next: {} • {}  ",
            output::format_time(&due.format(TIME_FORMAT).to_string()),
            due.format(DATE_FORMAT)
        ),
        None => String::new(),
    };
    frame.render_widget(
        Paragraph::new(format!("{next}a: add  d: remove  ?: help  q: quit"))
            .style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

fn render_field(
    frame: &mut Frame,
    label: &str,
    value: &str,
    focused: bool,
    chunks: &[Rect],
    idx: &mut usize,
) {
    let label_style = if focused {
        Style::default().fg(Color::Cyan).bold()
    } else {
        Style::default()
    };
    frame.render_widget(Paragraph::new(label).style(label_style), chunks[*idx]);
    *idx += 1;

    let cursor = if focused { "_" } else { "" };
    frame.render_widget(
        Paragraph::new(format!("  {value}{cursor}")).style(Style::default().fg(Color::White)),
        chunks[*idx],
    );
    *idx += 1;
}

fn render_add_dialog(frame: &mut Frame, app: &App) {
    let Some(form) = &app.add_form else {
        return;
    };

    let term = frame.area();
    let width = 50.min(term.width.saturating_sub(4));
    let height = 9.min(term.height.saturating_sub(2)); // 3*(label+input) + hint + borders
    let area = centered_rect(width, height, term);

    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Add Task ")
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1), // hint
            Constraint::Min(0),
        ])
        .split(inner);

    let mut idx = 0;
    render_field(
        frame,
        "Title:",
        &form.input.title,
        form.focused == AddField::Title,
        &chunks,
        &mut idx,
    );
    render_field(
        frame,
        "Time (HH:MM):",
        &form.input.time,
        form.focused == AddField::Time,
        &chunks,
        &mut idx,
    );
    render_field(
        frame,
        "Date (YYYY-MM-DD):",
        &form.input.date,
        form.focused == AddField::Date,
        &chunks,
        &mut idx,
    );

    frame.render_widget(
        Paragraph::new("Enter: submit  Tab/S-Tab: fields  Esc: cancel  C-u: clear")
            .style(Style::default().fg(Color::DarkGray)),
        chunks[idx],
    );
}

fn render_alert(frame: &mut Frame, message: &str, pending: usize) {
    let term = frame.area();
    let width = 44.min(term.width.saturating_sub(4));
    let height = 6.min(term.height.saturating_sub(2));
    let area = centered_rect(width, height, term);

    frame.render_widget(Clear, area);

    let title = if pending > 1 {
        format!(" Reminder (1 of {pending}) ")
    } else {
        " Reminder ".to_string()
    };
    let text = vec![
        Line::from(Span::styled(message.to_string(), Style::default().bold())),
        Line::raw(""),
        Line::from(Span::styled(
            "Enter: dismiss",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(
        Paragraph::new(text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn render_help(frame: &mut Frame) {
    let term = frame.area();
    let width = 40.min(term.width.saturating_sub(4));
    let height = 14.min(term.height.saturating_sub(2));
    let area = centered_rect(width, height, term);

    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let key = |k: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(k, Style::default().fg(Color::Cyan)),
            Span::raw(what),
        ])
    };
    let help_text = vec![
        key("j/Down  ", "Move down"),
        key("k/Up    ", "Move up"),
        key("a       ", "Add task"),
        key("d/x/Del ", "Remove selected task"),
        key("?       ", "Toggle help"),
        key("q/Esc   ", "Quit"),
        Line::raw(""),
        Line::from(vec![Span::styled("Add Task Dialog:", Style::default().bold())]),
        key("  Tab/S-Tab ", "Next/prev field"),
        key("  Enter     ", "Submit"),
        key("  Esc       ", "Cancel"),
        key("  C-u       ", "Clear field"),
    ];

    frame.render_widget(Paragraph::new(help_text), inner);
}
