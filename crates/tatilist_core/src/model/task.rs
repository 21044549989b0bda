//! Task and subtask records.
//!
//! # Responsibility
//! - Define the canonical task shape shared by reconciler, views and engine.
//! - Decode/encode the remote JSON record (`lists/{listId}/tasks/{key}`).
//!
//! # Invariants
//! - `id` is never serialized into the record; the store key is the identity.
//! - Missing or `null` fields decode to defaults instead of failing.
//! - Priority is clamped by writers, never by the decoder.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store key assigned to a task by the remote store.
pub type TaskId = String;

/// Highest task priority.
pub const PRIORITY_HIGH: i64 = 1;
/// Lowest task priority; also the default for new and legacy records.
pub const PRIORITY_LOW: i64 = 3;

/// Fixed category labels offered by the task editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Personal,
    Work,
    Shopping,
    Home,
    Health,
    Finance,
    /// Fallback for missing or unknown labels written by other devices.
    #[default]
    Other,
}

impl Category {
    /// All categories in editor order.
    pub const ALL: [Category; 7] = [
        Self::Personal,
        Self::Work,
        Self::Shopping,
        Self::Home,
        Self::Health,
        Self::Finance,
        Self::Other,
    ];

    /// Stable label stored in the remote record.
    pub fn label(self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::Work => "Work",
            Self::Shopping => "Shopping",
            Self::Home => "Home",
            Self::Health => "Health",
            Self::Finance => "Finance",
            Self::Other => "Other",
        }
    }

    /// Parses a stored label case-insensitively; unknown labels map to `Other`.
    pub fn from_label(value: &str) -> Self {
        let normalized = value.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(normalized))
            .unwrap_or(Self::Other)
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::from_label(value.as_str())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.label().to_string()
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Checklist entry owned by a parent task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Subtask {
    /// May be empty while the user is still typing.
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expense: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
}

impl Subtask {
    pub fn new(title: impl Into<String>, expense: f64) -> Self {
        Self {
            title: title.into(),
            expense,
            completed: false,
        }
    }
}

/// One task of a shared list.
///
/// Updating any field, including a single subtask, rewrites the whole record
/// at the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Store key. `None` until the task has been read back from the store.
    #[serde(skip)]
    pub id: Option<TaskId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Unix epoch milliseconds. `None` means "no due date".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    /// 1 = highest, 3 = lowest.
    #[serde(default = "default_priority", deserialize_with = "null_as_low_priority")]
    pub priority: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expense: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: Category,
    /// Informational flag; no recurrence is scheduled.
    #[serde(default, deserialize_with = "null_as_default")]
    pub recurring: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtasks: Vec<Subtask>,
}

impl Task {
    /// Creates an unsaved task with default fields.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            due_date: None,
            priority: PRIORITY_LOW,
            completed: false,
            expense: 0.0,
            category: Category::default(),
            recurring: false,
            subtasks: Vec::new(),
        }
    }

    /// Decodes a raw store record and attaches the store key as identity.
    pub fn from_record(key: &str, record: &Value) -> Result<Self, serde_json::Error> {
        let mut task = Task::deserialize(record)?;
        task.id = Some(key.to_string());
        Ok(task)
    }

    /// Encodes this task as a store record. The identity is not part of it.
    pub fn to_record(&self) -> Result<Value, TaskValidationError> {
        serde_json::to_value(self).map_err(|err| TaskValidationError::Encode(err.to_string()))
    }

    /// Checks the minimal rules applied before the first write.
    pub fn validate_for_create(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        Ok(())
    }

    /// Returns the store key required by update/delete.
    pub fn require_id(&self) -> Result<&str, TaskValidationError> {
        match self.id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(TaskValidationError::MissingId),
        }
    }

    /// Priority clamped into `1..=3`.
    pub fn normalized_priority(&self) -> i64 {
        self.priority.clamp(PRIORITY_HIGH, PRIORITY_LOW)
    }
}

/// Rejections raised before any write is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyTitle,
    MissingId,
    Encode(String),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "task title must not be empty"),
            Self::MissingId => write!(f, "task has no store id; it was never persisted"),
            Self::Encode(message) => write!(f, "task record could not be encoded: {message}"),
        }
    }
}

impl Error for TaskValidationError {}

fn default_priority() -> i64 {
    PRIORITY_LOW
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_low_priority<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(PRIORITY_LOW))
}

#[cfg(test)]
mod tests {
    use super::{Category, Subtask, Task, TaskValidationError, PRIORITY_LOW};
    use serde_json::json;

    #[test]
    fn decodes_full_record_and_attaches_key() {
        let record = json!({
            "title": "Groceries",
            "description": "weekly",
            "dueDate": 1_717_977_600_000_i64,
            "priority": 1,
            "completed": false,
            "expense": 50,
            "category": "Shopping",
            "recurring": true,
            "subtasks": [{"title": "milk", "expense": 2.5, "completed": true}]
        });

        let task = Task::from_record("k1", &record).expect("record should decode");
        assert_eq!(task.id.as_deref(), Some("k1"));
        assert_eq!(task.due_date, Some(1_717_977_600_000));
        assert_eq!(task.expense, 50.0);
        assert_eq!(task.category, Category::Shopping);
        assert!(task.recurring);
        assert_eq!(task.subtasks.len(), 1);
        assert!(task.subtasks[0].completed);
    }

    #[test]
    fn missing_and_null_fields_decode_to_defaults() {
        let record = json!({
            "title": "bare",
            "dueDate": null,
            "subtasks": null,
            "category": null
        });

        let task = Task::from_record("k2", &record).expect("sparse record should decode");
        assert_eq!(task.description, "");
        assert_eq!(task.due_date, None);
        assert_eq!(task.priority, PRIORITY_LOW);
        assert_eq!(task.category, Category::Other);
        assert!(task.subtasks.is_empty());
    }

    #[test]
    fn wrong_field_type_is_a_decode_error() {
        let record = json!({"title": 42});
        assert!(Task::from_record("k3", &record).is_err());
        assert!(Task::from_record("k4", &json!("not an object")).is_err());
    }

    #[test]
    fn unknown_category_label_maps_to_other() {
        assert_eq!(Category::from_label("  work "), Category::Work);
        assert_eq!(Category::from_label("Gardening"), Category::Other);
    }

    #[test]
    fn record_never_contains_identity_and_omits_absent_due_date() {
        let mut task = Task::new("pay rent");
        task.id = Some("key".to_string());
        task.subtasks.push(Subtask::new("transfer", 10.0));

        let record = task.to_record().expect("task should encode");
        let object = record.as_object().expect("record is an object");
        assert!(!object.contains_key("id"));
        assert!(!object.contains_key("dueDate"));
        assert_eq!(object["subtasks"][0]["expense"], 10.0);

        let decoded = Task::from_record("key", &record).expect("encoded record decodes");
        assert_eq!(decoded, task);
    }

    #[test]
    fn validation_rejects_blank_title_and_missing_id() {
        let task = Task::new("   ");
        assert_eq!(
            task.validate_for_create(),
            Err(TaskValidationError::EmptyTitle)
        );
        assert_eq!(task.require_id(), Err(TaskValidationError::MissingId));
    }

    #[test]
    fn normalized_priority_clamps_out_of_range_values() {
        let mut task = Task::new("x");
        task.priority = 0;
        assert_eq!(task.normalized_priority(), 1);
        task.priority = 9;
        assert_eq!(task.normalized_priority(), 3);
    }
}
