//! Adapters that live inside the domain crate for convenience.
//!
//! The in-memory repositories back unit tests and the `memory` storage mode
//! of the CLI. Durable storage lives in the `sqlite-adapter` crate.

pub mod log_notifier;
pub mod memory_repo;
