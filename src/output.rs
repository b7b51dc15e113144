use crate::model::Task;

pub const EMPTY_LIST: &str = "No tasks yet — add a study goal!";

/// Renders an `HH:MM` wall-clock time in 12-hour form: `13:05` → `1:05 PM`,
/// `00:30` → `12:30 AM`. Empty input stays empty; anything else that doesn't
/// look like a time is returned unchanged.
pub fn format_time(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let Some((hour, minute)) = value.split_once(':') else {
        return value.to_string();
    };
    let Ok(hour) = hour.trim().parse::<u32>() else {
        return value.to_string();
    };
    let suffix = if hour >= 12 { "PM" } else { "AM" };
    let hour = (hour + 11) % 12 + 1;
    format!("{hour}:{minute} {suffix}")
}

/// `9:00 AM • 2024-01-01`
pub fn format_when(task: &Task) -> String {
    format!("{} • {}", format_time(&task.time_str()), task.date_str())
}

pub fn format_task_line(task: &Task) -> String {
    format!(
        "{} [{}] {}  {}",
        task.icon(),
        task.id,
        task.title,
        format_when(task)
    )
}

pub fn format_task_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return format!("{EMPTY_LIST}\n");
    }
    let mut out = String::new();
    for task in tasks {
        out.push_str(&format_task_line(task));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{parse_date, parse_time, TaskId};

    fn make_task(id: u64, title: &str, time: &str, notified: bool) -> Task {
        let mut task = Task::new(
            title,
            parse_date("2024-01-01").unwrap(),
            parse_time(time).unwrap(),
        );
        task.id = TaskId(id);
        task.notified = notified;
        task
    }

    #[test]
    fn twelve_hour_times() {
        assert_eq!(format_time("00:30"), "12:30 AM");
        assert_eq!(format_time("13:05"), "1:05 PM");
        assert_eq!(format_time("12:00"), "12:00 PM");
        assert_eq!(format_time("09:15"), "9:15 AM");
        assert_eq!(format_time("23:59"), "11:59 PM");
        assert_eq!(format_time(""), "");
    }

    #[test]
    fn unparsable_time_passes_through() {
        assert_eq!(format_time("noon"), "noon");
        assert_eq!(format_time("xx:10"), "xx:10");
    }

    #[test]
    fn empty_list_placeholder() {
        assert_eq!(format_task_list(&[]), "No tasks yet — add a study goal!\n");
    }

    #[test]
    fn list_lines() {
        let tasks = vec![
            make_task(1, "Read Ch.1", "09:00", false),
            make_task(2, "Essay", "21:30", true),
        ];
        let out = format_task_list(&tasks);
        assert_eq!(
            out,
            ". [1] Read Ch.1  9:00 AM • 2024-01-01\nx [2] Essay  9:30 PM • 2024-01-01\n"
        );
    }
}
