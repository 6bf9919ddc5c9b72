// src/exec/env.rs

//! Parameter values to environment variables.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::config::{ParameterConfig, ScriptConfig};
use crate::types::{ExecutionId, ParameterValues};

pub const EXECUTION_ID_VAR: &str = "EXECUTION_ID";
pub const PARAM_ENV_PREFIX: &str = "PARAM_";

/// Variable name for a parameter: the configured `env_var`, or
/// `PARAM_<NAME>` with the name transliterated to ASCII, upper-cased and
/// every character outside `[A-Z0-9_]` replaced by `_`.
pub fn env_var_name(parameter: &ParameterConfig) -> String {
    match parameter.env_var.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{PARAM_ENV_PREFIX}{}", sanitize(&parameter.name)),
    }
}

fn sanitize(name: &str) -> String {
    deunicode::deunicode(name)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Environment added on top of the inherited one.
///
/// Two parameters mapping to the same variable both lose it; neither value
/// silently wins. `EXECUTION_ID` is set unless a parameter claims the name.
pub fn build_env(
    config: &ScriptConfig,
    values: &ParameterValues,
    execution_id: ExecutionId,
) -> BTreeMap<String, String> {
    let env_parameters: Vec<(&ParameterConfig, String)> = config
        .parameters()
        .iter()
        .filter(|parameter| parameter.pass_as.as_env())
        .map(|parameter| (parameter, env_var_name(parameter)))
        .collect();

    let mut seen = BTreeSet::new();
    let mut collided = BTreeSet::new();
    for (_, name) in env_parameters.iter() {
        if !seen.insert(name.as_str()) {
            collided.insert(name.as_str());
        }
    }

    let mut env = BTreeMap::new();
    for (parameter, name) in env_parameters.iter() {
        if collided.contains(name.as_str()) {
            warn!(
                parameter = %parameter.name,
                env_var = %name,
                "environment variable claimed by several parameters; not set"
            );
            continue;
        }
        let Some(value) = values.get(&parameter.name) else {
            continue;
        };
        let text = if parameter.no_value {
            value.is_truthy().to_string()
        } else {
            value.to_plain_string()
        };
        env.insert(name.clone(), text);
    }

    if !seen.contains(EXECUTION_ID_VAR) {
        env.insert(EXECUTION_ID_VAR.to_string(), execution_id.to_string());
    }

    env
}
