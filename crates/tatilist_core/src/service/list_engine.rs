//! Shared list engine.
//!
//! # Responsibility
//! - Own the single active collection subscription and its reconciler worker.
//! - Own the canonical collection and publish derived views to consumers.
//! - Expose task mutations, list switching and joining.
//!
//! # Invariants
//! - At most one subscription and one worker exist per engine; the previous
//!   worker is joined and its subscription dropped before a new one opens.
//! - The worker reconciles only the latest queued snapshot; a later snapshot
//!   fully supersedes earlier ones.
//! - Channel errors are reported on the error stream and never clear the
//!   last known good collection.
//! - Mutations are fire-and-forget: their effect shows up in a later snapshot.
//!
//! # State machine
//! `Unsubscribed -> activate -> Subscribed -> switch_list -> Subscribed`,
//! any state `-> dispose -> Disposed` (terminal).

use crate::model::task::{Task, TaskId, TaskValidationError};
use crate::repo::preference_repo::{PrefError, PreferenceStore, PREF_USER_ID};
use crate::service::collaborators::{
    task_completed_notice, task_created_notice, CalendarEvent, CalendarSink, NoopCalendar,
    NoopNotifier, Notifier,
};
use crate::service::membership::{share_payload, MembershipError, MembershipManager, SharePayload};
use crate::sync::channel::{ChannelError, CollectionSnapshot, SnapshotEvent, Subscription, SyncChannel};
use crate::sync::path::{normalize_key, PathError, StorePath};
use crate::view::expense::monthly_expense;
use crate::view::filter::{filter_tasks, Tab};
use crate::view::reconciler::{drain_latest, reconcile};
use chrono::{DateTime, Local, TimeZone};
use crossbeam_channel::{select, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::thread::JoinHandle;

const WORKER_THREAD_NAME: &str = "tatilist-reconciler";

/// Views kept for a slow or absent consumer; older views are dropped first.
pub const UPDATE_QUEUE_CAPACITY: usize = 32;
/// Errors kept for a slow or absent consumer; older errors are dropped first.
pub const ERROR_QUEUE_CAPACITY: usize = 32;

pub type EngineResult<T> = Result<T, EngineError>;

/// Source of "now" for calendar-relative views.
///
/// Implemented for every `Fn() -> DateTime<Tz>`, so the zone's own rules
/// (including DST) decide which day and month a due date falls on.
pub trait Clock: Send + Sync {
    /// Tab view and current-month total of `canonical`, both as of one instant.
    fn derive(&self, canonical: &[Task], tab: Tab) -> (Vec<Task>, f64);
}

impl<F, Tz> Clock for F
where
    F: Fn() -> DateTime<Tz> + Send + Sync,
    Tz: TimeZone,
{
    fn derive(&self, canonical: &[Task], tab: Tab) -> (Vec<Task>, f64) {
        let now = self();
        (
            filter_tasks(canonical, tab, &now),
            monthly_expense(canonical, &now),
        )
    }
}

/// Input rejected before any write was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Task(TaskValidationError),
    ListId(PathError),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task(err) => write!(f, "{err}"),
            Self::ListId(err) => write!(f, "invalid list id: {err}"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Task(err) => Some(err),
            Self::ListId(err) => Some(err),
        }
    }
}

/// Consumer-visible engine failures.
#[derive(Debug)]
pub enum EngineError {
    /// Transport, read or write failure; not retried.
    Channel(ChannelError),
    /// Join target list does not exist; the active list is unchanged.
    NotFound(String),
    Validation(ValidationError),
    /// Operation not allowed in the current lifecycle state.
    InvalidState(String),
    Preferences(PrefError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Channel(err) => write!(f, "{err}"),
            Self::NotFound(list_id) => write!(f, "list does not exist: {list_id}"),
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::InvalidState(message) => write!(f, "invalid engine state: {message}"),
            Self::Preferences(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Channel(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Preferences(err) => Some(err),
            Self::NotFound(_) | Self::InvalidState(_) => None,
        }
    }
}

impl From<ChannelError> for EngineError {
    fn from(value: ChannelError) -> Self {
        Self::Channel(value)
    }
}

impl From<PrefError> for EngineError {
    fn from(value: PrefError) -> Self {
        Self::Preferences(value)
    }
}

impl From<TaskValidationError> for EngineError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(ValidationError::Task(value))
    }
}

impl From<PathError> for EngineError {
    fn from(value: PathError) -> Self {
        Self::Validation(ValidationError::ListId(value))
    }
}

impl From<MembershipError> for EngineError {
    fn from(value: MembershipError) -> Self {
        match value {
            MembershipError::InvalidListId(err) => err.into(),
            MembershipError::NotFound(list_id) => Self::NotFound(list_id),
            MembershipError::Channel(err) => Self::Channel(err),
        }
    }
}

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unsubscribed,
    Subscribed,
    Disposed,
}

/// Immutable view published to consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    pub list_id: Option<String>,
    pub tab: Tab,
    /// Tasks visible under `tab`, in canonical order.
    pub tasks: Vec<Task>,
    /// Current-month total over the full collection, not just `tasks`.
    pub monthly_expense: f64,
    /// Incremented on every canonical collection replacement.
    pub generation: u64,
}

struct ViewState {
    list_id: Option<String>,
    tab: Tab,
    canonical: Arc<Vec<Task>>,
    generation: u64,
}

impl ViewState {
    fn render(&self, clock: &dyn Clock) -> ListView {
        let (tasks, monthly_expense) = clock.derive(&self.canonical, self.tab);
        ListView {
            list_id: self.list_id.clone(),
            tab: self.tab,
            tasks,
            monthly_expense,
            generation: self.generation,
        }
    }
}

/// Bounded queue that evicts its oldest entry instead of blocking or growing.
///
/// The engine keeps one receiver for eviction, so consumers may come and go.
struct LatestQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> LatestQueue<T> {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Self { sender, receiver }
    }

    /// Returns the number of entries evicted to make room.
    fn push(&self, mut item: T) -> usize {
        let mut evicted = 0;
        loop {
            match self.sender.try_send(item) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return evicted,
                Err(TrySendError::Full(rejected)) => {
                    if self.receiver.try_recv().is_ok() {
                        evicted += 1;
                    }
                    item = rejected;
                }
            }
        }
    }

    fn subscribe(&self) -> Receiver<T> {
        self.receiver.clone()
    }
}

/// State shared between the engine and its reconciler worker.
struct Shared {
    view: Mutex<ViewState>,
    updates: LatestQueue<ListView>,
    errors: LatestQueue<EngineError>,
    clock: Box<dyn Clock>,
}

impl Shared {
    /// Publishing happens under the view lock so consumers observe views in
    /// the same order the state changed.
    fn publish(&self, view: &ViewState) -> ListView {
        let rendered = view.render(self.clock.as_ref());
        let evicted = self.updates.push(rendered.clone());
        if evicted > 0 {
            debug!("event=view_publish module=engine status=evicted count={evicted}");
        }
        rendered
    }

    fn report(&self, err: EngineError) {
        warn!("event=engine_error module=engine status=reported error={err}");
        self.errors.push(err);
    }

    fn apply_snapshot(&self, list_id: &str, snapshot: &CollectionSnapshot) {
        let reconciled = reconcile(snapshot);
        let mut view = self.view.lock();
        if view.list_id.as_deref() != Some(list_id) {
            debug!("event=snapshot_reconcile module=engine status=stale list_id={list_id}");
            return;
        }

        view.canonical = Arc::new(reconciled.tasks);
        view.generation += 1;
        self.publish(&view);
        info!(
            "event=snapshot_reconcile module=engine status=ok list_id={} tasks={} skipped={} generation={}",
            list_id,
            view.canonical.len(),
            reconciled.skipped.len(),
            view.generation
        );
    }
}

struct ActiveSubscription {
    list_id: String,
    stop: Sender<()>,
    worker: JoinHandle<()>,
    subscription: Subscription,
}

impl ActiveSubscription {
    /// Stops the worker, waits for it, then unsubscribes.
    fn shutdown(self) {
        let Self {
            list_id,
            stop,
            worker,
            subscription,
        } = self;
        let _ = stop.send(());
        if worker.join().is_err() {
            error!("event=worker_join module=engine status=error list_id={list_id}");
        }
        subscription.cancel();
        debug!("event=list_unsubscribe module=engine status=ok list_id={list_id}");
    }
}

/// Façade over sync channel, reconciler, views and membership.
pub struct ListEngine {
    channel: Arc<dyn SyncChannel>,
    preferences: Box<dyn PreferenceStore>,
    membership: MembershipManager,
    calendar: Arc<dyn CalendarSink>,
    notifier: Arc<dyn Notifier>,
    shared: Arc<Shared>,
    active: Option<ActiveSubscription>,
    disposed: bool,
}

impl ListEngine {
    /// Creates an unsubscribed engine.
    ///
    /// Loads the local member id from preferences, generating and persisting
    /// one on first run.
    pub fn new(
        channel: Arc<dyn SyncChannel>,
        preferences: Box<dyn PreferenceStore>,
    ) -> EngineResult<Self> {
        let user_id = match preferences.get(PREF_USER_ID)? {
            Some(user_id) => user_id,
            None => {
                let user_id = MembershipManager::generate_user_id();
                preferences.set(PREF_USER_ID, &user_id)?;
                user_id
            }
        };

        let clock: Box<dyn Clock> = Box::new(Local::now);
        let shared = Arc::new(Shared {
            view: Mutex::new(ViewState {
                list_id: None,
                tab: Tab::default(),
                canonical: Arc::new(Vec::new()),
                generation: 0,
            }),
            updates: LatestQueue::new(UPDATE_QUEUE_CAPACITY),
            errors: LatestQueue::new(ERROR_QUEUE_CAPACITY),
            clock,
        });

        Ok(Self {
            membership: MembershipManager::new(Arc::clone(&channel), user_id),
            channel,
            preferences,
            calendar: Arc::new(NoopCalendar),
            notifier: Arc::new(NoopNotifier),
            shared,
            active: None,
            disposed: false,
        })
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn CalendarSink>) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replaces the wall clock used for "today" and "this month".
    ///
    /// Must be called before the first activation.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.clock = Box::new(clock);
        } else {
            warn!("event=engine_clock module=engine status=ignored reason=worker_running");
        }
        self
    }

    /// Activates the persisted list, creating a fresh one on first run.
    pub fn start(&mut self) -> EngineResult<()> {
        let list_id = match self.preferences.active_list_id()? {
            Some(list_id) => list_id,
            None => {
                let list_id = MembershipManager::create_local_list();
                info!("event=list_create module=engine status=ok list_id={list_id}");
                list_id
            }
        };
        self.activate(&list_id)
    }

    /// Opens the subscription for `list_id` and starts reconciling.
    pub fn activate(&mut self, list_id: &str) -> EngineResult<()> {
        self.ensure_not_disposed()?;
        if let Some(active) = &self.active {
            return Err(EngineError::InvalidState(format!(
                "already subscribed to `{}`; use switch_list",
                active.list_id
            )));
        }

        let list_id = normalize_key(list_id)?;
        let subscription = self.channel.subscribe_collection(&list_id)?;
        {
            let mut view = self.shared.view.lock();
            view.list_id = Some(list_id.clone());
            view.canonical = Arc::new(Vec::new());
        }

        let (stop, stop_rx) = crossbeam_channel::bounded(1);
        let events = subscription.events().clone();
        let shared = Arc::clone(&self.shared);
        let worker_list_id = list_id.clone();
        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_reconciler(&shared, &worker_list_id, &events, &stop_rx))
            .map_err(|err| {
                EngineError::InvalidState(format!("failed to start reconciler worker: {err}"))
            })?;

        self.active = Some(ActiveSubscription {
            list_id: list_id.clone(),
            stop,
            worker,
            subscription,
        });
        info!("event=list_activate module=engine status=ok list_id={list_id}");

        if let Err(err) = self.preferences.set_active_list_id(&list_id) {
            error!("event=pref_write module=engine status=error key=listId error={err}");
            self.shared.report(err.into());
        }
        self.ensure_membership(&list_id);
        Ok(())
    }

    /// Tears down the current subscription and activates `new_list_id`.
    ///
    /// An invalid id is rejected before the current subscription is touched.
    pub fn switch_list(&mut self, new_list_id: &str) -> EngineResult<()> {
        self.ensure_not_disposed()?;
        let new_list_id = normalize_key(new_list_id)?;
        let Some(active) = self.active.take() else {
            return Err(EngineError::InvalidState(
                "switch_list requires an active subscription".to_string(),
            ));
        };

        let previous = active.list_id.clone();
        active.shutdown();
        info!("event=list_switch module=engine status=start from={previous} to={new_list_id}");
        if let Err(err) = self.activate(&new_list_id) {
            error!("event=list_switch module=engine status=error from={previous} to={new_list_id} error={err}");
            self.clear_view();
            return Err(err);
        }
        Ok(())
    }

    /// Joins an existing list by id and makes it the active list.
    ///
    /// On `NotFound` the active list and subscription are unchanged.
    pub fn join_list(&mut self, candidate: &str) -> EngineResult<()> {
        self.ensure_not_disposed()?;
        let list_id = self.membership.join_list(candidate)?;
        if self.active.is_some() {
            self.switch_list(&list_id)
        } else {
            self.activate(&list_id)
        }
    }

    /// Stops processing snapshots for good. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(active) = self.active.take() {
            active.shutdown();
        }
        if !self.disposed {
            self.disposed = true;
            info!("event=engine_dispose module=engine status=ok");
        }
    }

    /// Writes a new task under a store-generated key.
    ///
    /// The task shows up in the canonical collection with its id once the
    /// next snapshot arrives. Returns the generated key.
    pub fn create_task(&self, task: &Task) -> EngineResult<TaskId> {
        let list_id = self.require_subscribed()?;
        task.validate_for_create()?;

        let key = self.channel.generate_key();
        let path = StorePath::task(&list_id, &key).map_err(ChannelError::from)?;
        let mut record = task.clone();
        record.id = None;
        record.priority = task.normalized_priority();
        self.channel.write(&path, record.to_record()?)?;
        info!("event=task_create module=engine status=ok list_id={list_id} task_id={key}");

        self.ensure_membership(&list_id);
        let (title, body) = task_created_notice(task);
        self.notifier.notify(title, body);
        if let Some(event) = CalendarEvent::for_task(task) {
            if let Err(err) = self.calendar.insert_event(&event) {
                warn!("event=calendar_insert module=engine status=error task_id={key} error={err}");
            }
        }
        Ok(key)
    }

    /// Replaces the whole stored record of `task`, subtasks included.
    ///
    /// Editing one subtask therefore rewrites the entire parent task.
    pub fn update_task(&self, task: &Task) -> EngineResult<()> {
        let list_id = self.require_subscribed()?;
        let task_id = task.require_id()?;

        let path = StorePath::task(&list_id, task_id)?;
        let mut record = task.clone();
        record.priority = task.normalized_priority();
        self.channel.write(&path, record.to_record()?)?;
        info!("event=task_update module=engine status=ok list_id={list_id} task_id={task_id}");

        self.ensure_membership(&list_id);
        if task.completed {
            let (title, body) = task_completed_notice(task);
            self.notifier.notify(title, body);
        }
        Ok(())
    }

    pub fn delete_task(&self, task: &Task) -> EngineResult<()> {
        let list_id = self.require_subscribed()?;
        let task_id = task.require_id()?;

        self.channel.remove(&StorePath::task(&list_id, task_id)?)?;
        info!("event=task_delete module=engine status=ok list_id={list_id} task_id={task_id}");
        self.ensure_membership(&list_id);
        Ok(())
    }

    /// Switches the visible tab. Filters the in-memory collection; no store
    /// read is issued.
    pub fn select_tab(&self, tab: Tab) -> ListView {
        let mut view = self.shared.view.lock();
        view.tab = tab;
        debug!("event=tab_select module=engine status=ok tab={}", tab.label());
        self.shared.publish(&view)
    }

    /// Renders the current view without publishing it.
    pub fn current_view(&self) -> ListView {
        let view = self.shared.view.lock();
        view.render(self.shared.clock.as_ref())
    }

    /// Canonical collection of the active list.
    pub fn tasks(&self) -> Arc<Vec<Task>> {
        Arc::clone(&self.shared.view.lock().canonical)
    }

    pub fn active_list_id(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.list_id.as_str())
    }

    pub fn state(&self) -> EngineState {
        if self.disposed {
            EngineState::Disposed
        } else if self.active.is_some() {
            EngineState::Subscribed
        } else {
            EngineState::Unsubscribed
        }
    }

    pub fn local_user_id(&self) -> &str {
        self.membership.local_user_id()
    }

    /// One-shot member count of the active list.
    pub fn member_count(&self) -> EngineResult<usize> {
        let list_id = self.require_subscribed()?;
        Ok(self.membership.count_members(&list_id)?)
    }

    /// Share sheet content for the active list.
    pub fn share_payload(&self) -> EngineResult<SharePayload> {
        let list_id = self.require_subscribed()?;
        Ok(share_payload(&list_id))
    }

    /// Stream of published views.
    ///
    /// Holds at most [`UPDATE_QUEUE_CAPACITY`] views; when full the oldest
    /// view is dropped, so a lagging consumer still ends on the latest one.
    /// Receivers share one queue: each view goes to exactly one of them.
    pub fn updates(&self) -> Receiver<ListView> {
        self.shared.updates.subscribe()
    }

    /// Stream of asynchronous failures, separate from `updates`.
    ///
    /// Bounded like `updates` at [`ERROR_QUEUE_CAPACITY`].
    pub fn errors(&self) -> Receiver<EngineError> {
        self.shared.errors.subscribe()
    }

    /// Forgets the previous list's collection once no subscription backs it.
    fn clear_view(&self) {
        let mut view = self.shared.view.lock();
        view.list_id = None;
        view.canonical = Arc::new(Vec::new());
        view.generation += 1;
        self.shared.publish(&view);
    }

    fn ensure_not_disposed(&self) -> EngineResult<()> {
        if self.disposed {
            return Err(EngineError::InvalidState("engine is disposed".to_string()));
        }
        Ok(())
    }

    fn require_subscribed(&self) -> EngineResult<String> {
        self.ensure_not_disposed()?;
        self.active
            .as_ref()
            .map(|active| active.list_id.clone())
            .ok_or_else(|| EngineError::InvalidState("no active list subscription".to_string()))
    }

    /// Fire-and-forget membership registration; failures go to `errors()`.
    fn ensure_membership(&self, list_id: &str) {
        if let Err(err) = self.membership.register_self(list_id) {
            warn!("event=member_register module=engine status=error list_id={list_id} error={err}");
            self.shared.report(err.into());
        }
    }
}

impl Drop for ListEngine {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.shutdown();
        }
    }
}

/// Worker loop: one reconciliation at a time, always on the latest snapshot.
fn run_reconciler(
    shared: &Shared,
    list_id: &str,
    events: &Receiver<SnapshotEvent>,
    stop: &Receiver<()>,
) {
    debug!("event=worker_start module=engine status=ok list_id={list_id}");
    loop {
        let first = select! {
            recv(stop) -> _ => break,
            recv(events) -> event => match event {
                Ok(event) => event,
                Err(_) => {
                    warn!("event=worker_stop module=engine status=channel_closed list_id={list_id}");
                    break;
                }
            },
        };

        let drained = drain_latest(first, events);
        if drained.superseded > 0 {
            debug!(
                "event=snapshot_drop module=engine status=superseded list_id={list_id} count={}",
                drained.superseded
            );
        }
        for err in drained.errors {
            shared.report(EngineError::Channel(err));
        }
        if let Some(snapshot) = drained.latest {
            shared.apply_snapshot(list_id, &snapshot);
        }
    }
    debug!("event=worker_stop module=engine status=ok list_id={list_id}");
}
