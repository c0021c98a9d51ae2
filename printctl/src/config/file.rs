//! Device configuration file loading.

use std::path::Path;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::defaults::{
    DEFAULT_LOGGING_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TIMER_TIMEOUT_SECS,
};
use crate::client::Credentials;
use crate::datalog::LoggerConfig;

/// Settings for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Section name the settings were read from.
    pub name: String,
    pub ip_address: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub request_timeout: Duration,
    pub logging_interval: Duration,
    pub timer_timeout: Duration,
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read or parse the config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// No section for the requested device
    #[error("No configuration for device '{0}'")]
    MissingSection(String),

    /// Required key absent from a device section
    #[error("Missing configuration: {section}.{key}")]
    MissingKey { section: String, key: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl DeviceConfig {
    /// Settings for a device at `ip_address` with every optional key defaulted.
    pub fn new(name: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ip_address: ip_address.into(),
            username: None,
            password: None,
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_SECS),
            logging_interval: Duration::from_secs_f64(DEFAULT_LOGGING_INTERVAL_SECS),
            timer_timeout: Duration::from_secs_f64(DEFAULT_TIMER_TIMEOUT_SECS),
        }
    }

    /// Load the section `name` from the INI file at `path`.
    pub fn load_from(path: &Path, name: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_file(path)?;
        super::parser::parse_device(&ini, name)
    }

    /// Load the section `name` from INI text.
    pub fn load_from_str(text: &str, name: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(text).map_err(ini::Error::Parse)?;
        super::parser::parse_device(&ini, name)
    }

    /// Digest credentials, when both username and password are configured.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            _ => None,
        }
    }

    /// Root URL the endpoint descriptor is compiled against.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.ip_address)
    }

    pub fn logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            interval: self.logging_interval,
            wait_timeout: self.timer_timeout,
        }
    }
}

/// Names of every device section in the file at `path`.
pub fn device_names(path: &Path) -> Result<Vec<String>, ConfigFileError> {
    let ini = Ini::load_from_file(path)?;
    Ok(ini.sections().flatten().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("printctl.ini");
        std::fs::write(
            &config_path,
            r#"
[hnl]
ip_address = 10.0.0.2
username = maker
password = secret

[spare]
ip_address = 10.0.0.3
"#,
        )
        .unwrap();

        let config = DeviceConfig::load_from(&config_path, "hnl").unwrap();
        assert_eq!(config.name, "hnl");
        assert_eq!(config.base_url(), "http://10.0.0.2");
        assert_eq!(
            config.credentials(),
            Some(Credentials::new("maker", "secret"))
        );
        assert_eq!(config.request_timeout, Duration::from_secs(30));

        assert_eq!(
            device_names(&config_path).unwrap(),
            vec!["hnl".to_string(), "spare".to_string()]
        );
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = DeviceConfig::load_from(&temp_dir.path().join("nope.ini"), "hnl");
        assert!(matches!(result, Err(ConfigFileError::ReadError(_))));
    }

    #[test]
    fn test_credentials_need_both_keys() {
        let mut config = DeviceConfig::new("hnl", "10.0.0.2");
        config.username = Some("maker".into());
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_logger_config_uses_intervals() {
        let mut config = DeviceConfig::new("hnl", "10.0.0.2");
        config.logging_interval = Duration::from_millis(250);
        let logger = config.logger_config();
        assert_eq!(logger.interval, Duration::from_millis(250));
        assert_eq!(logger.wait_timeout, Duration::from_secs(600));
    }
}
