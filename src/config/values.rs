// src/config/values.rs

//! `--param name=value` handling for the command-line front end.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::model::{ParameterConfig, ScriptConfig};
use crate::errors::{Result, ScriptcastError};
use crate::types::{ParameterValue, ParameterValues};

/// Split `name=value`. Only the first `=` separates; the value may contain
/// more of them.
pub fn parse_assignment(s: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in '{s}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Build the values map for `config` from command-line assignments.
///
/// - a name given once becomes text (or a boolean for flag-only parameters),
/// - a name given several times becomes a list, in the order given,
/// - parameters not mentioned fall back to their `default`.
pub fn resolve_values(
    config: &ScriptConfig,
    assignments: &[(String, String)],
) -> Result<ParameterValues> {
    let mut given: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (name, value) in assignments.iter() {
        if config.parameter(name).is_none() {
            return Err(ScriptcastError::ConfigError(format!(
                "script '{}' has no parameter '{}'",
                config.name(),
                name
            )));
        }
        given.entry(name.as_str()).or_default().push(value.clone());
    }

    let mut values = ParameterValues::new();
    for parameter in config.parameters().iter() {
        let value = match given.remove(parameter.name.as_str()) {
            Some(raw) => to_value(parameter, raw)?,
            None => match parameter.default.clone() {
                Some(default) => default,
                None => continue,
            },
        };
        values.insert(parameter.name.clone(), value);
    }

    debug!(script = %config.name(), count = values.len(), "resolved parameter values");
    Ok(values)
}

fn to_value(parameter: &ParameterConfig, mut raw: Vec<String>) -> Result<ParameterValue> {
    if parameter.no_value {
        let [single] = raw.as_slice() else {
            return Err(ScriptcastError::ConfigError(format!(
                "flag parameter '{}' given more than once",
                parameter.name
            )));
        };
        return parse_flag(single)
            .map(ParameterValue::Bool)
            .ok_or_else(|| {
                ScriptcastError::ConfigError(format!(
                    "flag parameter '{}' expects true or false, got '{}'",
                    parameter.name, single
                ))
            });
    }

    if raw.len() == 1 {
        return Ok(ParameterValue::Text(raw.remove(0)));
    }
    Ok(ParameterValue::List(raw))
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
