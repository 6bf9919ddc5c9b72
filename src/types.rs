// src/types.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Registry key of one script invocation.
pub type ExecutionId = u64;

/// Parameter values keyed by parameter name, already mapped to what the
/// script should receive.
pub type ParameterValues = BTreeMap<String, ParameterValue>;

/// Caller identity as handed over by the (external) authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub user_id: String,
    pub audit_name: String,
}

impl User {
    pub fn new(user_id: impl Into<String>, audit_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            audit_name: audit_name.into(),
        }
    }

    /// A user whose audit name is its id (e.g. the local CLI user).
    pub fn local(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            audit_name: user_id.clone(),
            user_id,
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.audit_name)
    }
}

/// How a parameter value reaches the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PassAs {
    #[serde(rename = "argument")]
    Argument,
    #[serde(rename = "env_variable")]
    EnvVariable,
    #[serde(rename = "stdin")]
    Stdin,
    #[serde(rename = "argument+env_variable")]
    ArgumentAndEnv,
}

impl PassAs {
    pub fn as_argument(self) -> bool {
        matches!(self, PassAs::Argument | PassAs::ArgumentAndEnv)
    }

    pub fn as_env(self) -> bool {
        matches!(self, PassAs::EnvVariable | PassAs::ArgumentAndEnv)
    }

    pub fn as_stdin(self) -> bool {
        matches!(self, PassAs::Stdin)
    }
}

impl Default for PassAs {
    fn default() -> Self {
        PassAs::ArgumentAndEnv
    }
}

impl FromStr for PassAs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "argument" => Ok(PassAs::Argument),
            "env_variable" => Ok(PassAs::EnvVariable),
            "stdin" => Ok(PassAs::Stdin),
            "argument+env_variable" | "argument + env_variable" => Ok(PassAs::ArgumentAndEnv),
            other => Err(format!(
                "invalid pass_as: {other} (expected \"argument\", \"env_variable\", \"stdin\" or \"argument+env_variable\")"
            )),
        }
    }
}

/// How a list value is expanded into command-line arguments.
///
/// - `SingleArgument`: values joined with the parameter separator into one
///   argument (`--opt a,b,c`).
/// - `ArgumentPerValue`: the flag once, then each value (`--opt a b c`).
/// - `RepeatParamValue`: the flag before every value (`--opt a --opt b`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiValueMode {
    SingleArgument,
    ArgumentPerValue,
    RepeatParamValue,
}

impl Default for MultiValueMode {
    fn default() -> Self {
        MultiValueMode::SingleArgument
    }
}

/// A single resolved parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl ParameterValue {
    /// Empty text and empty lists carry nothing to pass on.
    pub fn is_empty(&self) -> bool {
        match self {
            ParameterValue::Text(s) => s.is_empty(),
            ParameterValue::List(values) => values.is_empty(),
            ParameterValue::Bool(_) | ParameterValue::Int(_) => false,
        }
    }

    /// Whether a flag-style (`no_value`) parameter is switched on.
    pub fn is_truthy(&self) -> bool {
        match self {
            ParameterValue::Bool(b) => *b,
            ParameterValue::Int(i) => *i != 0,
            ParameterValue::Text(s) => s.trim().eq_ignore_ascii_case("true"),
            ParameterValue::List(values) => !values.is_empty(),
        }
    }

    /// Individual values; scalars become a one-element list.
    pub fn as_strings(&self) -> Vec<String> {
        match self {
            ParameterValue::List(values) => values.clone(),
            other => vec![other.to_plain_string()],
        }
    }

    /// Single-string form used for env variables and stdin.
    pub fn to_plain_string(&self) -> String {
        match self {
            ParameterValue::Bool(b) => b.to_string(),
            ParameterValue::Int(i) => i.to_string(),
            ParameterValue::Text(s) => s.clone(),
            ParameterValue::List(values) => values.join(","),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Text(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Int(value)
    }
}

impl From<Vec<String>> for ParameterValue {
    fn from(values: Vec<String>) -> Self {
        ParameterValue::List(values)
    }
}
