//! Daemon configuration using Figment.
//!
//! Configuration is loaded from:
//! 1. a TOML file (`config/daemon.toml` by default)
//! 2. environment variables prefixed with `RUST_DAQD_`, where `__` separates
//!    nested keys (e.g. `RUST_DAQD_ACQUISITION__MAX_READ_BYTES=4096`)
//!
//! # Example
//! ```no_run
//! use rust_daqd::config::DaemonConfig;
//!
//! let config = DaemonConfig::load()?;
//! config.validate()?;
//! println!("Serving {} devices", config.devices.len());
//! # Ok::<(), rust_daqd::config::ConfigError>(())
//! ```

use std::collections::HashSet;
use std::path::Path;

use daq_core::limits::{DEFAULT_ATTR_BUFFER_SIZE, DEFAULT_MAX_READ_BYTES};
use daq_driver_mock::MockDeviceConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use thiserror::Error;

use crate::attributes::AttributeAccess;
use crate::session::{Framing, SessionSettings};

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/daemon.toml";

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file or environment could not be parsed.
    #[error("Configuration error: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Values parsed but are not usable.
    #[error("Configuration validation error: {0}")]
    Invalid(String),
}

/// Top-level daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Acquisition engine settings
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Simulated devices served by the mock backend
    #[serde(default)]
    pub devices: Vec<MockDeviceConfig>,
}

/// Application-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Log span open/close events (one span per acquisition worker)
    #[serde(default)]
    pub log_span_events: bool,
}

/// Acquisition engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AcquisitionConfig {
    /// Upper bound on bytes moved by one hardware read
    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: usize,
    /// Attribute read buffer size in bytes
    #[serde(default = "default_attr_buffer_size")]
    pub attr_buffer_size: usize,
    /// Payload framing for streamed reads
    #[serde(default)]
    pub framing: Framing,
    /// Whether new connections report errors verbosely
    #[serde(default)]
    pub verbose: bool,
}

// Default value functions
fn default_name() -> String {
    "rust-daqd".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_max_read_bytes() -> usize {
    DEFAULT_MAX_READ_BYTES
}

fn default_attr_buffer_size() -> usize {
    DEFAULT_ATTR_BUFFER_SIZE
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_span_events: false,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_read_bytes: default_max_read_bytes(),
            attr_buffer_size: default_attr_buffer_size(),
            framing: Framing::default(),
            verbose: false,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default path and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; every section has defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RUST_DAQD_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        if self.acquisition.max_read_bytes == 0 {
            return Err(ConfigError::Invalid(
                "acquisition.max_read_bytes must be greater than 0".to_string(),
            ));
        }

        if self.acquisition.attr_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "acquisition.attr_buffer_size must be greater than 0".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        for device in &self.devices {
            if !ids.insert(&device.id) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate device ID: {}",
                    device.id
                )));
            }
        }

        Ok(())
    }

    /// Session tuning derived from the acquisition section.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            max_read_bytes: self.acquisition.max_read_bytes,
            framing: self.acquisition.framing,
        }
    }

    /// Attribute access derived from the acquisition section.
    pub fn attribute_access(&self) -> AttributeAccess {
        AttributeAccess::new(self.acquisition.attr_buffer_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
            [application]
            name = "bench"
            log_level = "debug"
            log_format = "json"
            log_span_events = true

            [acquisition]
            max_read_bytes = 4096
            attr_buffer_size = 256
            framing = "per_round"
            verbose = true

            [[devices]]
            id = "iio:device0"
            name = "ad7476"

            [devices.attributes]
            sampling_frequency = "1000000"
            "#,
        );

        let config = DaemonConfig::load_from(file.path()).unwrap();
        assert_eq!(config.application.name, "bench");
        assert_eq!(config.application.log_format, "json");
        assert!(config.application.log_span_events);
        assert_eq!(config.acquisition.max_read_bytes, 4096);
        assert_eq!(config.acquisition.framing, Framing::PerRound);
        assert!(config.acquisition.verbose);
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].name.as_deref(), Some("ad7476"));
        assert!(config.validate().is_ok());

        let settings = config.session_settings();
        assert_eq!(settings.max_read_bytes, 4096);
        assert_eq!(config.attribute_access().buffer_size(), 256);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = DaemonConfig::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.acquisition.max_read_bytes, DEFAULT_MAX_READ_BYTES);
        assert_eq!(config.acquisition.framing, Framing::Silent);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = DaemonConfig::load_from("does/not/exist.toml").unwrap();
        config.application.log_level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = DaemonConfig::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config.application.log_format, "compact");
        config.application.log_format = "xml".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn test_zero_read_cap_rejected() {
        let mut config = DaemonConfig::load_from("does/not/exist.toml").unwrap();
        config.acquisition.max_read_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_device_ids() {
        let file = write_config(
            r#"
            [[devices]]
            id = "iio:device0"

            [[devices]]
            id = "iio:device0"
            "#,
        );
        let config = DaemonConfig::load_from(file.path()).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate device ID"));
    }
}
