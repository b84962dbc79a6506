//! Configuration validation utilities.

use serde_json::Value;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, TetherConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &TetherConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;

    if !matches!(config.template_params, Value::Null | Value::Object(_)) {
        return Err(ConfigError::validation(
            "template_params must be a table of values",
        ));
    }

    for (name, options) in &config.plugins {
        if name.is_empty() {
            return Err(ConfigError::validation("Plugin names must not be empty"));
        }
        if !matches!(options, Value::Null | Value::Bool(_) | Value::Object(_)) {
            return Err(ConfigError::validation(format!(
                "Options for plugin '{name}' must be a table or a boolean"
            )));
        }
    }

    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is 'file'",
        ));
    }

    if logging.max_files == 0 {
        return Err(ConfigError::validation(
            "logging.max_files must be greater than 0",
        ));
    }

    for target in logging.filters.keys() {
        if target.is_empty() || target.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Invalid logging filter target: '{target}'"
            )));
        }
    }

    Ok(())
}
