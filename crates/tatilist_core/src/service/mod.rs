//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate sync channel, views and preferences into list use-cases.
//! - Keep platform collaborators behind narrow traits.

pub mod collaborators;
pub mod list_engine;
pub mod membership;
