// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawScriptConfig, ScriptConfig};
use crate::errors::Result;

/// Read a script definition without semantic validation.
///
/// Use [`load_and_validate`] for anything that is going to be executed.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawScriptConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawScriptConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Read and validate a script definition.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde`).
/// - Checks parameter names, flag-only parameters, stdin triggers and
///   separators.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ScriptConfig> {
    let raw_config = load_from_path(&path)?;
    let config = ScriptConfig::try_from(raw_config)?;
    Ok(config)
}

/// `script.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("script.toml")
}
