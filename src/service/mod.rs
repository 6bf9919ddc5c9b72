// src/service/mod.rs

//! Execution registry.
//!
//! [`ExecutionService`] is the entry point for callers: it allocates
//! execution ids, starts [`ScriptExecutor`](crate::exec::ScriptExecutor)s,
//! enforces ownership and notifies start / finish listeners. All operations
//! are synchronous and safe to call from any thread.

pub mod access;
pub mod id;
pub mod info;
pub mod registry;

pub use access::{AccessMode, Authorizer, HistoryAdmins, OwnersOnly};
pub use id::IdGenerator;
pub use info::ExecutionInfo;
pub use registry::{ExecutionListener, ExecutionService};
