//! Remote sync channel abstraction.
//!
//! # Responsibility
//! - Define the subscribe/read/write contract of the keyed real-time store.
//! - Build and validate store paths (`lists/{listId}/...`).
//! - Ship an in-process reference store used by tests and the CLI.
//!
//! # Invariants
//! - Collection subscriptions always deliver full snapshots, never deltas.
//! - Retry policy, if any, belongs to channel implementations.

pub mod channel;
pub mod memory;
pub mod path;
