// src/exec/masking.rs

//! Secret masking for the protected output and the audit command.

use regex::Regex;

use crate::config::ScriptConfig;
use crate::errors::{Result, ScriptcastError};
use crate::types::{ParameterValue, ParameterValues};

pub const SECURE_MASK: &str = "******";

/// Replaces every occurrence of the configured secrets with
/// [`SECURE_MASK`].
///
/// A secret only matches as a whole word: `cat` masks `cat ate` but leaves
/// `concatenate` alone. Secrets starting or ending with a non-word character
/// (`@dmin!`) are not anchored on that side.
#[derive(Debug, Clone)]
pub struct SecretMasker {
    pattern: Regex,
}

impl SecretMasker {
    /// `None` when there is nothing to mask.
    pub fn new<I, S>(secrets: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut secrets: Vec<String> = secrets
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if secrets.is_empty() {
            return Ok(None);
        }

        // Longest first so a secret containing another one is masked whole.
        secrets.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        secrets.dedup();

        let alternatives: Vec<String> = secrets.iter().map(|s| word_pattern(s)).collect();
        let pattern = Regex::new(&alternatives.join("|")).map_err(|err| {
            ScriptcastError::ConfigError(format!("cannot build secret mask: {err}"))
        })?;

        Ok(Some(Self { pattern }))
    }

    pub fn mask(&self, text: &str) -> String {
        self.pattern.replace_all(text, SECURE_MASK).into_owned()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn word_pattern(secret: &str) -> String {
    let mut pattern = String::new();
    if secret.starts_with(is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(secret));
    if secret.ends_with(is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern
}

/// Non-empty values of secure parameters, list items individually.
pub fn secret_values(config: &ScriptConfig, values: &ParameterValues) -> Vec<String> {
    config
        .parameters()
        .iter()
        .filter(|parameter| parameter.secure && !parameter.no_value)
        .filter_map(|parameter| values.get(&parameter.name))
        .flat_map(ParameterValue::as_strings)
        .filter(|value| !value.is_empty())
        .collect()
}

/// `values` with every secure value replaced by [`SECURE_MASK`]. Flag-only
/// parameters keep their value: only the flag itself ends up in argv.
pub fn secure_values(config: &ScriptConfig, values: &ParameterValues) -> ParameterValues {
    let mut secured = values.clone();
    for parameter in config.parameters().iter() {
        if !parameter.secure || parameter.no_value {
            continue;
        }
        if let Some(value) = secured.get_mut(&parameter.name) {
            *value = match value {
                ParameterValue::List(items) => {
                    ParameterValue::List(vec![SECURE_MASK.to_string(); items.len()])
                }
                _ => ParameterValue::Text(SECURE_MASK.to_string()),
            };
        }
    }
    secured
}
