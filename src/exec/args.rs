// src/exec/args.rs

//! Parameter values to argv.
//!
//! Pure functions; nothing here touches the OS.

use crate::config::{ParameterConfig, ScriptConfig};
use crate::errors::{Result, ScriptcastError};
use crate::types::{MultiValueMode, ParameterValue, ParameterValues};

/// Arguments contributed by one parameter.
///
/// - flag-only parameters yield the flag when the value is truthy;
/// - empty values yield nothing, not even the flag;
/// - lists expand according to the parameter's [`MultiValueMode`].
pub fn build_args(parameter: &ParameterConfig, value: &ParameterValue) -> Vec<String> {
    if parameter.no_value {
        return match parameter.param.as_deref() {
            Some(flag) if value.is_truthy() => vec![flag.to_string()],
            _ => Vec::new(),
        };
    }

    if value.is_empty() {
        return Vec::new();
    }

    let ParameterValue::List(items) = value else {
        return with_flag(parameter, value.to_plain_string());
    };

    match parameter.multi_value_mode {
        MultiValueMode::SingleArgument => with_flag(parameter, items.join(&parameter.separator)),
        MultiValueMode::ArgumentPerValue => {
            let mut items = items.iter().cloned();
            let mut args = match items.next() {
                Some(first) => with_flag(parameter, first),
                None => return Vec::new(),
            };
            args.extend(items);
            args
        }
        MultiValueMode::RepeatParamValue => items
            .iter()
            .flat_map(|item| with_flag(parameter, item.clone()))
            .collect(),
    }
}

fn with_flag(parameter: &ParameterConfig, value: String) -> Vec<String> {
    match parameter.param.as_deref() {
        None | Some("") => vec![value],
        Some(flag) if parameter.same_arg_param => vec![format!("{flag}{value}")],
        Some(flag) => vec![flag.to_string(), value],
    }
}

/// Arguments of every argument-passed parameter, in definition order.
pub fn build_command_args(config: &ScriptConfig, values: &ParameterValues) -> Vec<String> {
    config
        .parameters()
        .iter()
        .filter(|parameter| parameter.pass_as.as_argument())
        .filter_map(|parameter| {
            values
                .get(&parameter.name)
                .map(|value| build_args(parameter, value))
        })
        .flatten()
        .collect()
}

/// Program and full argument list: the split `script_path` followed by the
/// parameter arguments.
pub fn build_command(
    config: &ScriptConfig,
    values: &ParameterValues,
) -> Result<(String, Vec<String>)> {
    let mut words = shell_words::split(config.script_path()).map_err(|err| {
        ScriptcastError::ConfigError(format!(
            "cannot split command of script '{}': {}",
            config.name(),
            err
        ))
    })?;
    if words.is_empty() {
        return Err(ScriptcastError::ConfigError(format!(
            "script '{}' has an empty command",
            config.name()
        )));
    }

    let program = words.remove(0);
    words.extend(build_command_args(config, values));
    Ok((program, words))
}
