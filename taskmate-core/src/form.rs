//! Form state for creating/editing tasks and registering an account.
//!
//! Forms hold raw text the way a user typed it; turning them into payloads
//! is where validation happens.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::task::{Priority, TaskDraft, TaskStatus};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("invalid due date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

/// Split comma-separated label text into trimmed labels.
///
/// Order is kept and nothing is deduplicated; stray commas produce empty
/// labels. Blank text means no labels at all.
pub fn split_labels(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    text.split(',').map(|l| l.trim().to_string()).collect()
}

/// Empty text means unscheduled.
pub fn parse_due_date(text: &str) -> Result<Option<NaiveDate>, FormError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map(Some)
        .map_err(|_| FormError::InvalidDate(text.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    /// `YYYY-MM-DD` or empty.
    pub due_date: String,
    /// Comma-separated.
    pub labels: String,
}

impl Default for TaskForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            due_date: String::new(),
            labels: String::new(),
        }
    }
}

impl TaskForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn validate(&self) -> Result<(), FormError> {
        if self.title.trim().is_empty() {
            return Err(FormError::MissingField("title"));
        }
        if self.description.trim().is_empty() {
            return Err(FormError::MissingField("description"));
        }
        parse_due_date(&self.due_date)?;
        Ok(())
    }

    pub fn to_draft(&self) -> Result<TaskDraft, FormError> {
        self.validate()?;
        Ok(TaskDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            priority: self.priority,
            due_date: parse_due_date(&self.due_date)?,
            labels: split_labels(&self.labels),
        })
    }
}

/// Registration payload as typed by the user.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RegisterForm {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        if self.name.trim().is_empty() {
            return Err(FormError::MissingField("name"));
        }
        if self.email.trim().is_empty() {
            return Err(FormError::MissingField("email"));
        }
        if self.password.is_empty() {
            return Err(FormError::MissingField("password"));
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
