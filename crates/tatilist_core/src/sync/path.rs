//! Store path construction.
//!
//! # Invariants
//! - Every segment is non-empty after trimming.
//! - Segments never contain `/ . # $ [ ]`, which the hosted store reserves.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

const LISTS_ROOT: &str = "lists";
const TASKS_NODE: &str = "tasks";
const USERS_NODE: &str = "users";

static KEY_SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^/.#$\[\]]+$").expect("valid key segment regex"));

/// Path validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    EmptySegment,
    InvalidSegment(String),
}

impl Display for PathError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySegment => write!(f, "store key must not be empty"),
            Self::InvalidSegment(value) => {
                write!(f, "store key contains reserved characters: `{value}`")
            }
        }
    }
}

impl Error for PathError {}

/// Normalizes one key segment (list id, task key, user id).
pub fn normalize_key(value: &str) -> Result<String, PathError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PathError::EmptySegment);
    }
    if !KEY_SEGMENT_RE.is_match(trimmed) {
        return Err(PathError::InvalidSegment(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Slash-separated location in the hierarchical store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// Builds a path from raw segments, validating each one.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments = segments
            .into_iter()
            .map(|segment| normalize_key(segment.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    /// `lists/{listId}`
    pub fn list(list_id: &str) -> Result<Self, PathError> {
        Self::from_segments([LISTS_ROOT, list_id])
    }

    /// `lists/{listId}/tasks`
    pub fn tasks(list_id: &str) -> Result<Self, PathError> {
        Self::from_segments([LISTS_ROOT, list_id, TASKS_NODE])
    }

    /// `lists/{listId}/tasks/{taskKey}`
    pub fn task(list_id: &str, task_key: &str) -> Result<Self, PathError> {
        Self::from_segments([LISTS_ROOT, list_id, TASKS_NODE, task_key])
    }

    /// `lists/{listId}/users`
    pub fn users(list_id: &str) -> Result<Self, PathError> {
        Self::from_segments([LISTS_ROOT, list_id, USERS_NODE])
    }

    /// `lists/{listId}/users/{userId}`
    pub fn user(list_id: &str, user_id: &str) -> Result<Self, PathError> {
        Self::from_segments([LISTS_ROOT, list_id, USERS_NODE, user_id])
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns whether `self` equals `other` or lies above it in the tree.
    pub fn is_ancestor_or_self(&self, other: &StorePath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Returns whether the two paths share a branch (either contains the other).
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.is_ancestor_or_self(other) || other.is_ancestor_or_self(self)
    }
}

impl Display for StorePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_key, PathError, StorePath};

    #[test]
    fn builds_list_scoped_paths() {
        let path = StorePath::task(" abc ", "k1").expect("valid path");
        assert_eq!(path.to_string(), "lists/abc/tasks/k1");
        assert_eq!(
            StorePath::user("abc", "u1").expect("valid path").to_string(),
            "lists/abc/users/u1"
        );
    }

    #[test]
    fn rejects_empty_and_reserved_segments() {
        assert_eq!(normalize_key("   "), Err(PathError::EmptySegment));
        assert!(matches!(
            StorePath::list("a/b"),
            Err(PathError::InvalidSegment(_))
        ));
        assert!(matches!(
            StorePath::list("a.b"),
            Err(PathError::InvalidSegment(_))
        ));
        assert!(matches!(
            StorePath::list("$root"),
            Err(PathError::InvalidSegment(_))
        ));
    }

    #[test]
    fn overlap_covers_ancestors_and_descendants() {
        let list = StorePath::list("abc").expect("valid path");
        let tasks = StorePath::tasks("abc").expect("valid path");
        let task = StorePath::task("abc", "k1").expect("valid path");
        let users = StorePath::users("abc").expect("valid path");

        assert!(list.overlaps(&tasks));
        assert!(task.overlaps(&tasks));
        assert!(!users.overlaps(&tasks));
    }
}
