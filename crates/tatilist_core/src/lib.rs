//! Core logic for TATILIST shared task lists.
//! This crate is the single source of truth for list sync and view invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;
pub mod view;

pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::task::{Category, Subtask, Task, TaskId, TaskValidationError};
pub use repo::preference_repo::{PrefError, PreferenceStore, SqlitePreferenceStore};
pub use service::collaborators::{
    CalendarEvent, CalendarSink, CollaboratorError, NoopCalendar, NoopNotifier, Notifier,
};
pub use service::list_engine::{
    Clock, EngineError, EngineResult, EngineState, ListEngine, ListView, ValidationError,
    ERROR_QUEUE_CAPACITY, UPDATE_QUEUE_CAPACITY,
};
pub use service::membership::{
    share_payload, short_list_label, MembershipError, MembershipManager, SharePayload,
};
pub use sync::channel::{
    ChannelError, ChannelResult, CollectionSnapshot, Snapshot, SnapshotEvent, Subscription,
    SyncChannel,
};
pub use sync::memory::MemorySyncChannel;
pub use sync::path::StorePath;
pub use view::expense::{format_monthly_total, monthly_expense};
pub use view::filter::{filter_tasks, Tab};
pub use view::reconciler::{reconcile, DecodeSkip, Reconciled};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
