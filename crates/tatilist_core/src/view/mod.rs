//! Canonical collection and derived views.
//!
//! # Responsibility
//! - Turn raw collection snapshots into the ordered canonical task list.
//! - Derive tab views and the monthly expense total from that list.
//!
//! # Invariants
//! - Every function here is pure over its inputs; nothing mutates a
//!   collection in place once it has been published.
//! - Calendar comparisons use the time zone of the supplied `now`.

pub mod expense;
pub mod filter;
pub mod reconciler;
