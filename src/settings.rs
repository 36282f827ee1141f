use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "gpsfix";
pub const ENV_PREFIX: &str = "GPSFIX";

/// Run settings. Read from an optional `gpsfix.toml` and `GPSFIX_*`
/// environment variables; command line flags are applied on top.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    batch_size: usize,
    output: String,
    failed_output: Option<String>,
    strict: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            batch_size: 100_000,
            output: "stdout".to_string(),
            failed_output: None,
            strict: false,
        }
    }
}

impl Settings {
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()
    }

    pub fn with_overrides(
        mut self,
        batch_size: Option<usize>,
        output: Option<String>,
        failed_output: Option<String>,
        strict: bool,
    ) -> Result<Self, ConfigError> {
        if let Some(batch_size) = batch_size {
            self.batch_size = batch_size;
        }
        if let Some(output) = output {
            self.output = output;
        }
        if failed_output.is_some() {
            self.failed_output = failed_output;
        }
        self.strict |= strict;
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Message("batch_size must be at least 1".to_string()));
        }
        Ok(self)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn failed_output(&self) -> Option<&str> {
        self.failed_output.as_deref()
    }

    pub fn strict(&self) -> bool {
        self.strict
    }
}
