//! INI parsing logic for converting `Ini` → `DeviceConfig`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::time::Duration;

use ini::{Ini, Properties};

use super::file::{ConfigFileError, DeviceConfig};

/// Parse the section `name` of an `Ini` into a `DeviceConfig`.
///
/// Starts from `DeviceConfig::new` defaults and overlays any values found.
pub(super) fn parse_device(ini: &Ini, name: &str) -> Result<DeviceConfig, ConfigFileError> {
    let section = ini
        .section(Some(name))
        .ok_or_else(|| ConfigFileError::MissingSection(name.to_string()))?;

    let ip_address = section
        .get("ip_address")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigFileError::MissingKey {
            section: name.to_string(),
            key: "ip_address".to_string(),
        })?;

    let mut config = DeviceConfig::new(name, ip_address);
    config.username = non_empty(section, "username");
    config.password = non_empty(section, "password");

    if let Some(v) = parse_seconds(section, name, "request_timeout")? {
        config.request_timeout = v;
    }
    if let Some(v) = parse_seconds(section, name, "logging_interval")? {
        config.logging_interval = v;
    }
    if let Some(v) = parse_seconds(section, name, "timer_timeout")? {
        config.timer_timeout = v;
    }

    Ok(config)
}

fn non_empty(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse a non-negative number of seconds, fractions allowed.
fn parse_seconds(
    section: &Properties,
    name: &str,
    key: &str,
) -> Result<Option<Duration>, ConfigFileError> {
    let Some(v) = section.get(key) else {
        return Ok(None);
    };
    let invalid = || ConfigFileError::InvalidValue {
        section: name.to_string(),
        key: key.to_string(),
        value: v.to_string(),
        reason: "must be a non-negative number (seconds)".to_string(),
    };
    let secs: f64 = v.trim().parse().map_err(|_| invalid())?;
    Duration::try_from_secs_f64(secs).map(Some).map_err(|_| invalid())
}
