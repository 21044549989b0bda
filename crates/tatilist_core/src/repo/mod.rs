//! Device-local persistence contracts and SQLite implementations.
//!
//! # Responsibility
//! - Store the small set of device preferences the engine depends on.
//! - Isolate SQL details from engine orchestration.
//!
//! # Invariants
//! - Preference keys are non-empty after trimming.
//! - Writes are upserts; reading a missing key is not an error.

pub mod preference_repo;
