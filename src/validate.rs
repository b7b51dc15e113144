use std::fmt;

use chrono::{NaiveDate, NaiveTime};

use crate::model::{parse_date, parse_time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Time,
    Date,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Time => "time",
            Self::Date => "date",
        }
    }
}

/// Why a submission did not become a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Missing(Field),
    Malformed(Field),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(field) => write!(f, "{} is required", field.as_str()),
            Self::Malformed(Field::Time) => f.write_str("time must be HH:MM"),
            Self::Malformed(Field::Date) => f.write_str("date must be YYYY-MM-DD"),
            Self::Malformed(field) => write!(f, "{} is malformed", field.as_str()),
        }
    }
}

/// Validated form fields, ready to become a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    pub title: String,
    pub time: NaiveTime,
    pub date: NaiveDate,
}

/// Validate raw form input: all three fields must be non-empty after
/// trimming, and time/date must parse.
pub fn task_fields(title: &str, time: &str, date: &str) -> Result<TaskFields, Rejection> {
    let title = title.trim();
    let time = time.trim();
    let date = date.trim();
    for (value, field) in [(title, Field::Title), (time, Field::Time), (date, Field::Date)] {
        if value.is_empty() {
            return Err(Rejection::Missing(field));
        }
    }
    let time = parse_time(time).map_err(|_| Rejection::Malformed(Field::Time))?;
    let date = parse_date(date).map_err(|_| Rejection::Malformed(Field::Date))?;
    Ok(TaskFields {
        title: title.to_string(),
        time,
        date,
    })
}
