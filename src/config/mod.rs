// src/config/mod.rs

//! Script definitions.
//!
//! - TOML-backed data model (`model.rs`).
//! - Loading from disk (`loader.rs`).
//! - Validation into a [`ScriptConfig`] (`validate.rs`).
//! - Turning `name=value` pairs from the command line into parameter values
//!   (`values.rs`).
//!
//! Deciding whether a value is *acceptable* for a parameter is the caller's
//! business; the engine only maps values onto argv, env and stdin.

pub mod loader;
pub mod model;
pub mod validate;
pub mod values;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ParameterConfig, RawScriptConfig, ScriptConfig};
pub use validate::validate_config;
pub use values::{parse_assignment, resolve_values};
