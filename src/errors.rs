// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Authorization and state-precondition failures are returned to the caller
//! of the registry operation. Failures inside the output pipeline never show
//! up here; they are surfaced as a diagnostic line in the output stream.

use std::time::Duration;

use thiserror::Error;

use crate::types::ExecutionId;

#[derive(Error, Debug)]
pub enum ScriptcastError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Execution {0} not found")]
    NotFound(ExecutionId),

    #[error("Access to execution {execution_id} is prohibited for user '{user_id}'")]
    AccessProhibited {
        execution_id: ExecutionId,
        user_id: String,
    },

    #[error("Process is already started")]
    AlreadyStarted,

    #[error("Process is not started")]
    NotStarted,

    #[error("Execution {0} is not finished")]
    NotFinished(ExecutionId),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0:?}")]
    StreamTimeout(Duration),

    #[error("Stream is closed")]
    StreamClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ScriptcastError>;
