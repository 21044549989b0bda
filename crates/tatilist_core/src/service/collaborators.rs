//! Narrow interfaces to platform collaborators.
//!
//! # Responsibility
//! - Describe what the engine hands to calendar and notification delivery.
//! - Keep platform failures non-fatal to the engine.
//!
//! # Invariants
//! - Calendar events are only produced for tasks with a due date.
//! - Collaborator errors are logged by the caller and never propagated.

use crate::model::task::Task;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Length of the calendar block created for a due task.
pub const CALENDAR_EVENT_DURATION_MS: i64 = 60 * 60 * 1000;
/// Time zone attached to inserted calendar events.
pub const CALENDAR_EVENT_TIMEZONE: &str = "UTC";

const TASK_CREATED_TITLE: &str = "New task created";
const TASK_COMPLETED_TITLE: &str = "Task completed";

/// Calendar entry derived from a due task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub title: String,
    pub description: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub timezone: String,
}

impl CalendarEvent {
    /// Returns `None` for tasks without a due date.
    pub fn for_task(task: &Task) -> Option<Self> {
        let start_ms = task.due_date?;
        Some(Self {
            title: task.title.clone(),
            description: task.description.clone(),
            start_ms,
            end_ms: start_ms.saturating_add(CALENDAR_EVENT_DURATION_MS),
            timezone: CALENDAR_EVENT_TIMEZONE.to_string(),
        })
    }
}

/// Failure reported by a platform collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorError {
    message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for CollaboratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "collaborator failed: {}", self.message)
    }
}

impl Error for CollaboratorError {}

/// OS calendar insertion.
pub trait CalendarSink: Send + Sync {
    fn insert_event(&self, event: &CalendarEvent) -> Result<(), CollaboratorError>;
}

/// User-visible notification delivery.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Calendar sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCalendar;

impl CalendarSink for NoopCalendar {
    fn insert_event(&self, _event: &CalendarEvent) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Notifier that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _title: &str, _body: &str) {}
}

/// Notification content for a newly created task.
pub fn task_created_notice(task: &Task) -> (&'static str, &str) {
    (TASK_CREATED_TITLE, task.title.as_str())
}

/// Notification content for a task saved as completed.
pub fn task_completed_notice(task: &Task) -> (&'static str, &str) {
    (TASK_COMPLETED_TITLE, task.title.as_str())
}
