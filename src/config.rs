//! Configuration loading via `ortho-config`.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Application configuration derived from configuration files and
/// environment variables with the `CARAVAN` prefix.
#[derive(Clone, Debug, Deserialize, Eq, OrthoConfig, PartialEq)]
#[ortho_config(prefix = "CARAVAN")]
pub struct AppConfig {
    /// Path of the JSON state document.
    #[ortho_config(default = "run_data.json".to_owned())]
    pub state_path: String,
    /// Path of the sample CSV file the exerciser uploads.
    #[ortho_config(default = "data/customers.csv".to_owned())]
    pub sample_data_path: String,
    /// Directory operator query templates are written into, and removed
    /// from again during decommissioning.
    #[ortho_config(default = "athena_queries".to_owned())]
    pub templates_dir: String,
    /// TCP port the dashboard binary binds.
    #[ortho_config(default = 8888)]
    pub dashboard_port: u16,
}

impl AppConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    /// Values merge defaults, configuration files, and environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("caravan")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns the state document path.
    #[must_use]
    pub fn state_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(&self.state_path)
    }

    /// Returns the sample data path.
    #[must_use]
    pub fn sample_data_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(&self.sample_data_path)
    }

    /// Returns the query-template directory.
    #[must_use]
    pub fn templates_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(&self.templates_dir)
    }

    /// Performs semantic validation on required fields. Error messages
    /// include the environment variable that supplies the missing value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is
    /// empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(&self.state_path, "state document path", "CARAVAN_STATE_PATH")?;
        Self::require_field(
            &self.sample_data_path,
            "sample data path",
            "CARAVAN_SAMPLE_DATA_PATH",
        )?;
        Self::require_field(
            &self.templates_dir,
            "query-template directory",
            "CARAVAN_TEMPLATES_DIR",
        )?;
        Ok(())
    }

    fn require_field(
        value: &str,
        description: &str,
        env_var: &str,
    ) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {description}: set {env_var} or add it to the configuration file"
            )));
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Eq, Error, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> AppConfig {
        AppConfig {
            state_path: String::from("run_data.json"),
            sample_data_path: String::from("data/customers.csv"),
            templates_dir: String::from("athena_queries"),
            dashboard_port: 8888,
        }
    }

    #[test]
    fn default_configuration_validates() {
        assert!(defaults().validate().is_ok());
    }

    #[test]
    fn blank_state_path_is_rejected() {
        let config = AppConfig {
            state_path: String::from("  "),
            ..defaults()
        };

        let Err(err) = config.validate() else {
            panic!("blank state path should be rejected");
        };
        assert!(
            matches!(err, ConfigError::MissingField(ref message) if message.contains("CARAVAN_STATE_PATH")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn paths_convert_to_utf8() {
        let config = defaults();
        assert_eq!(config.state_path(), Utf8PathBuf::from("run_data.json"));
        assert_eq!(config.templates_dir(), Utf8PathBuf::from("athena_queries"));
    }
}
