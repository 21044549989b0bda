//! Shared list domain model.
//!
//! # Responsibility
//! - Define the task records mirrored through the remote store.
//! - Own the wire codec for a single task record.
//!
//! # Invariants
//! - A task read back from the store always carries its store key as `id`.
//! - Subtasks have no identity of their own; they live inside the parent record.

pub mod task;
