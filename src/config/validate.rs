// src/config/validate.rs

use std::collections::BTreeSet;

use crate::config::model::{ParameterConfig, RawScriptConfig, ScriptConfig};
use crate::errors::{Result, ScriptcastError};
use crate::types::{MultiValueMode, PassAs};

impl TryFrom<RawScriptConfig> for ScriptConfig {
    type Error = crate::errors::ScriptcastError;

    fn try_from(raw: RawScriptConfig) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ScriptConfig::new_unchecked(raw))
    }
}

pub fn validate_config(cfg: &RawScriptConfig) -> Result<()> {
    validate_script(cfg)?;
    validate_parameter_names(cfg)?;
    for parameter in cfg.parameters.iter() {
        validate_parameter(parameter)?;
    }
    Ok(())
}

fn config_error(message: String) -> ScriptcastError {
    ScriptcastError::ConfigError(message)
}

fn validate_script(cfg: &RawScriptConfig) -> Result<()> {
    if cfg.name.trim().is_empty() {
        return Err(config_error("script `name` must not be empty".to_string()));
    }

    let words = shell_words::split(&cfg.script_path).map_err(|err| {
        config_error(format!(
            "script '{}' has an unparsable `script_path`: {}",
            cfg.name, err
        ))
    })?;
    if words.is_empty() {
        return Err(config_error(format!(
            "script '{}' has an empty `script_path`",
            cfg.name
        )));
    }

    Ok(())
}

fn validate_parameter_names(cfg: &RawScriptConfig) -> Result<()> {
    let mut seen = BTreeSet::new();
    for parameter in cfg.parameters.iter() {
        if parameter.name.trim().is_empty() {
            return Err(config_error(format!(
                "script '{}' has a parameter without a name",
                cfg.name
            )));
        }
        if !seen.insert(parameter.name.as_str()) {
            return Err(config_error(format!(
                "script '{}' defines parameter '{}' more than once",
                cfg.name, parameter.name
            )));
        }
    }
    Ok(())
}

fn validate_parameter(parameter: &ParameterConfig) -> Result<()> {
    let name = &parameter.name;

    if parameter.no_value && parameter.param.as_deref().is_none_or(str::is_empty) {
        return Err(config_error(format!(
            "parameter '{name}' has `no_value = true` but no `param` flag"
        )));
    }

    if parameter.stdin_expected_text.is_some() && parameter.pass_as != PassAs::Stdin {
        return Err(config_error(format!(
            "parameter '{name}' sets `stdin_expected_text` but is not passed as \"stdin\""
        )));
    }

    if parameter.multi_value_mode == MultiValueMode::SingleArgument
        && parameter.separator.is_empty()
    {
        return Err(config_error(format!(
            "parameter '{name}' uses `single_argument` with an empty `separator`"
        )));
    }

    if let Some(env_var) = parameter.env_var.as_deref() {
        let valid = !env_var.is_empty()
            && !env_var.starts_with(|c: char| c.is_ascii_digit())
            && env_var.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(config_error(format!(
                "parameter '{name}' has an invalid `env_var` '{env_var}'"
            )));
        }
    }

    Ok(())
}
