#![allow(dead_code)]

use std::path::PathBuf;

use scriptcast::config::{ParameterConfig, RawScriptConfig, ScriptConfig};
use scriptcast::types::{MultiValueMode, ParameterValue, PassAs};

/// Builder for `ScriptConfig` to simplify test setup.
pub struct ScriptConfigBuilder {
    config: RawScriptConfig,
}

impl ScriptConfigBuilder {
    pub fn new(script_path: &str) -> Self {
        Self {
            config: RawScriptConfig {
                name: "test-script".to_string(),
                script_path: script_path.to_string(),
                working_directory: None,
                requires_terminal: false,
                parameters: vec![],
            },
        }
    }

    /// `sh -c '<script>' sh`: parameter arguments arrive as `$1`, `$2`, ...
    pub fn shell(script: &str) -> Self {
        Self::new(&format!("sh -c {} sh", shell_quote(script)))
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.working_directory = Some(dir.into());
        self
    }

    pub fn requires_terminal(mut self, val: bool) -> Self {
        self.config.requires_terminal = val;
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterConfig) -> Self {
        self.config.parameters.push(parameter);
        self
    }

    pub fn build_raw(self) -> RawScriptConfig {
        self.config
    }

    pub fn build(self) -> ScriptConfig {
        ScriptConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Builder for `ParameterConfig`.
pub struct ParameterBuilder {
    parameter: ParameterConfig,
}

impl ParameterBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            parameter: ParameterConfig::new(name),
        }
    }

    pub fn param(mut self, flag: &str) -> Self {
        self.parameter.param = Some(flag.to_string());
        self
    }

    pub fn secure(mut self) -> Self {
        self.parameter.secure = true;
        self
    }

    pub fn pass_as(mut self, pass_as: PassAs) -> Self {
        self.parameter.pass_as = pass_as;
        self
    }

    pub fn env_var(mut self, name: &str) -> Self {
        self.parameter.env_var = Some(name.to_string());
        self
    }

    pub fn stdin_expected_text(mut self, text: &str) -> Self {
        self.parameter.pass_as = PassAs::Stdin;
        self.parameter.stdin_expected_text = Some(text.to_string());
        self
    }

    pub fn multi_value_mode(mut self, mode: MultiValueMode) -> Self {
        self.parameter.multi_value_mode = mode;
        self
    }

    pub fn separator(mut self, separator: &str) -> Self {
        self.parameter.separator = separator.to_string();
        self
    }

    pub fn same_arg_param(mut self) -> Self {
        self.parameter.same_arg_param = true;
        self
    }

    pub fn no_value(mut self) -> Self {
        self.parameter.no_value = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<ParameterValue>) -> Self {
        self.parameter.default = Some(value.into());
        self
    }

    pub fn build(self) -> ParameterConfig {
        self.parameter
    }
}
