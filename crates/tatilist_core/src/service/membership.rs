//! Shared list membership.
//!
//! # Responsibility
//! - Generate list and member identifiers.
//! - Validate join targets against the remote store.
//! - Register the local member idempotently.
//! - Build the share payload handed to the sharing collaborator.
//!
//! # Invariants
//! - Membership markers live at `lists/{listId}/users/{userId}` with value
//!   `true`; re-registering the same member rewrites the same key.
//! - A failed join never touches the store.

use crate::sync::channel::{ChannelError, SyncChannel};
use crate::sync::path::{normalize_key, PathError, StorePath};
use log::{info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

const SHORT_LABEL_CHARS: usize = 8;
const SHARE_SUBJECT: &str = "Share TATILIST list";

pub type MembershipResult<T> = Result<T, MembershipError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// Candidate id is empty or contains reserved characters.
    InvalidListId(PathError),
    /// No list exists under the candidate id.
    NotFound(String),
    Channel(ChannelError),
}

impl Display for MembershipError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidListId(err) => write!(f, "invalid list id: {err}"),
            Self::NotFound(list_id) => write!(f, "list does not exist: {list_id}"),
            Self::Channel(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MembershipError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidListId(err) => Some(err),
            Self::NotFound(_) => None,
            Self::Channel(err) => Some(err),
        }
    }
}

impl From<PathError> for MembershipError {
    fn from(value: PathError) -> Self {
        Self::InvalidListId(value)
    }
}

impl From<ChannelError> for MembershipError {
    fn from(value: ChannelError) -> Self {
        Self::Channel(value)
    }
}

/// Text handed to the platform share sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub subject: String,
    pub text: String,
}

/// Membership operations for one local member.
pub struct MembershipManager {
    channel: Arc<dyn SyncChannel>,
    local_user_id: String,
}

impl MembershipManager {
    pub fn new(channel: Arc<dyn SyncChannel>, local_user_id: impl Into<String>) -> Self {
        Self {
            channel,
            local_user_id: local_user_id.into(),
        }
    }

    /// Generates a fresh list id for a device that has not joined any list.
    pub fn create_local_list() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generates a fresh member id.
    pub fn generate_user_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    /// Checks that `candidate` names an existing list and registers the local
    /// member there. Returns the normalized list id.
    ///
    /// Switching the active list is left to the caller.
    pub fn join_list(&self, candidate: &str) -> MembershipResult<String> {
        let list_id = normalize_key(candidate)?;
        let snapshot = self.channel.read_once(&StorePath::list(&list_id)?)?;
        if !snapshot.exists() {
            warn!("event=list_join module=membership status=not_found list_id={list_id}");
            return Err(MembershipError::NotFound(list_id));
        }

        self.register_self(&list_id)?;
        info!("event=list_join module=membership status=ok list_id={list_id}");
        Ok(list_id)
    }

    /// Ensures the local member appears in the list's member set.
    pub fn register_self(&self, list_id: &str) -> MembershipResult<()> {
        let path = StorePath::user(list_id, &self.local_user_id)?;
        self.channel.write(&path, Value::Bool(true))?;
        Ok(())
    }

    /// Number of registered members; used for display only.
    pub fn count_members(&self, list_id: &str) -> MembershipResult<usize> {
        let snapshot = self.channel.read_once(&StorePath::users(list_id)?)?;
        Ok(snapshot.children_count())
    }
}

/// Share sheet content inviting someone to `list_id`.
pub fn share_payload(list_id: &str) -> SharePayload {
    SharePayload {
        subject: SHARE_SUBJECT.to_string(),
        text: format!("Join my TATILIST list!\n\nID: {list_id}\n\nUse this ID in the app."),
    }
}

/// Abbreviated list id for headers, e.g. `1234abcd...`.
pub fn short_list_label(list_id: &str) -> String {
    let short = list_id.chars().take(SHORT_LABEL_CHARS).collect::<String>();
    format!("{short}...")
}
