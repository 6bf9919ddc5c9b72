// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::{MultiValueMode, ParameterValue, PassAs};

/// Script definition as read from a TOML file.
///
/// ```toml
/// name = "Deploy"
/// script_path = "./deploy.sh --verbose"
/// working_directory = "/opt/app"
/// requires_terminal = false
///
/// [[parameter]]
/// name = "password"
/// param = "--password"
/// secure = true
/// pass_as = "argument"
/// ```
///
/// Validated into a [`ScriptConfig`] via `TryFrom`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawScriptConfig {
    pub name: String,

    /// Command line template; split like a POSIX shell would, without
    /// expansion.
    pub script_path: String,

    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// Run under a pseudo-terminal instead of plain pipes.
    #[serde(default)]
    pub requires_terminal: bool,

    /// `[[parameter]]` entries, in argv order.
    #[serde(default, rename = "parameter")]
    pub parameters: Vec<ParameterConfig>,
}

/// One `[[parameter]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterConfig {
    pub name: String,

    /// Command-line flag (`--password`). Without it the value is passed as a
    /// bare positional argument.
    #[serde(default)]
    pub param: Option<String>,

    /// Value must never show up in logs or in the protected output.
    #[serde(default)]
    pub secure: bool,

    #[serde(default)]
    pub pass_as: PassAs,

    /// Explicit environment variable name; derived from `name` otherwise.
    #[serde(default)]
    pub env_var: Option<String>,

    /// Write the value to stdin only once this text shows up in the output.
    #[serde(default)]
    pub stdin_expected_text: Option<String>,

    #[serde(default, rename = "multiselect_argument_type")]
    pub multi_value_mode: MultiValueMode,

    /// Joins list values for `single_argument`.
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Flag and value glued into one token (`--level=3` style when
    /// `param = "--level="`).
    #[serde(default)]
    pub same_arg_param: bool,

    /// Flag-only parameter: `param` is passed when the value is truthy.
    #[serde(default)]
    pub no_value: bool,

    #[serde(default)]
    pub default: Option<ParameterValue>,
}

fn default_separator() -> String {
    ",".to_string()
}

impl ParameterConfig {
    /// Parameter with every option at its default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: None,
            secure: false,
            pass_as: PassAs::default(),
            env_var: None,
            stdin_expected_text: None,
            multi_value_mode: MultiValueMode::default(),
            separator: default_separator(),
            same_arg_param: false,
            no_value: false,
            default: None,
        }
    }
}

/// Validated script definition.
///
/// Only obtainable through `TryFrom<RawScriptConfig>` (or the loader), so
/// holders can rely on unique parameter names and a non-empty command.
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    name: String,
    script_path: String,
    working_directory: Option<PathBuf>,
    requires_terminal: bool,
    parameters: Vec<ParameterConfig>,
}

impl ScriptConfig {
    pub(crate) fn new_unchecked(raw: RawScriptConfig) -> Self {
        Self {
            name: raw.name,
            script_path: raw.script_path,
            working_directory: raw.working_directory,
            requires_terminal: raw.requires_terminal,
            parameters: raw.parameters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn script_path(&self) -> &str {
        &self.script_path
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    pub fn requires_terminal(&self) -> bool {
        self.requires_terminal
    }

    pub fn parameters(&self) -> &[ParameterConfig] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterConfig> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Same definition, forced onto (or off) a pseudo-terminal.
    pub fn with_requires_terminal(mut self, requires_terminal: bool) -> Self {
        self.requires_terminal = requires_terminal;
        self
    }
}
