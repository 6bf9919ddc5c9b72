// src/exec/mod.rs

//! Script execution layer.
//!
//! Turns a validated [`ScriptConfig`](crate::config::ScriptConfig) plus
//! parameter values into a running [`ProcessHandle`](crate::process::ProcessHandle)
//! with a raw and a protected (secret-masked) output stream.
//!
//! - [`args`] builds argv from parameters.
//! - [`env`] builds the environment.
//! - [`masking`] masks secrets in output and in the audit command.
//! - [`stdin`] delivers stdin values once a prompt appears.
//! - [`executor`] ties it together in [`ScriptExecutor`].

pub mod args;
pub mod env;
pub mod executor;
pub mod masking;
pub mod stdin;

pub use args::{build_args, build_command};
pub use env::{EXECUTION_ID_VAR, build_env, env_var_name};
pub use executor::{OUTPUT_FLUSH_PERIOD, ScriptExecutor};
pub use masking::{SECURE_MASK, SecretMasker};
pub use stdin::StdinTrigger;
