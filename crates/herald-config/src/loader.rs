//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::path::PathBuf;
use tracing::{debug, info};

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "herald.toml",
    "config.toml",
    "./config/herald.toml",
    "/etc/herald/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with overrides read through
    /// `lookup`. The result is not validated.
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file(&lookup)? {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        } else {
            debug!("No configuration file found, using defaults");
        }

        apply_env_overrides(&mut config, &lookup)?;

        Ok(config)
    }

    /// Find the configuration file to use.
    ///
    /// An explicitly requested file that does not exist is an error; the
    /// standard search paths are only probed when nothing was requested.
    fn find_config_file<F>(&self, lookup: &F) -> Result<Option<PathBuf>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let requested = self
            .config_path
            .clone()
            .or_else(|| lookup("HERALD_CONFIG").map(PathBuf::from));

        if let Some(path) = requested {
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(ConfigError::ReadError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("config file not found: {}", path.display()),
            )));
        }

        Ok(CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists()))
    }
}

/// Apply environment variable overrides
fn apply_env_overrides<F>(config: &mut AppConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Provider
    if let Some(val) = lookup("HERALD_PROVIDER") {
        config.provider.kind = val
            .parse()
            .map_err(|e: ConfigError| ConfigError::EnvError(format!("HERALD_PROVIDER: {}", e)))?;
    }

    // Vonage
    if let Some(val) = lookup("VONAGE_API_KEY") {
        config.provider.vonage.api_key = val;
    }
    if let Some(val) = lookup("VONAGE_API_SECRET") {
        config.provider.vonage.api_secret = val;
    }
    if let Some(val) = lookup("VONAGE_FROM") {
        config.provider.vonage.from = val;
    }
    if let Some(val) = lookup("VONAGE_BASE_URL") {
        config.provider.vonage.base_url = val;
    }

    // Twilio
    if let Some(val) = lookup("TWILIO_ACCOUNT_SID") {
        config.provider.twilio.account_sid = val;
    }
    if let Some(val) = lookup("TWILIO_AUTH_TOKEN") {
        config.provider.twilio.auth_token = val;
    }
    if let Some(val) = lookup("TWILIO_FROM_NUMBER") {
        config.provider.twilio.from_number = val;
    }
    if let Some(val) = lookup("TWILIO_MESSAGING_SERVICE_SID") {
        config.provider.twilio.messaging_service_sid = val;
    }
    if let Some(val) = lookup("TWILIO_WHATSAPP_NUMBER") {
        config.provider.twilio.whatsapp_number = val;
    }
    if let Some(val) = lookup("TWILIO_BASE_URL") {
        config.provider.twilio.base_url = val;
    }

    // Dispatch
    if let Some(val) = lookup("HERALD_MIN_INTERVAL_MS") {
        config.dispatch.min_interval_ms = parse_env("HERALD_MIN_INTERVAL_MS", &val)?;
    }
    if let Some(val) = lookup("HERALD_DEFAULT_COUNTRY_CODE") {
        config.dispatch.default_country_code = val.trim().trim_start_matches('+').to_string();
    }
    if let Some(val) = lookup("HERALD_MAX_IN_FLIGHT") {
        config.dispatch.max_in_flight = parse_env("HERALD_MAX_IN_FLIGHT", &val)?;
    }

    // HTTP
    if let Some(val) = lookup("HERALD_HTTP_TIMEOUT_MS") {
        config.http.timeout_ms = parse_env("HERALD_HTTP_TIMEOUT_MS", &val)?;
    }
    if let Some(val) = lookup("HERALD_HTTP_CONNECT_TIMEOUT_MS") {
        config.http.connect_timeout_ms = parse_env("HERALD_HTTP_CONNECT_TIMEOUT_MS", &val)?;
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, val: &str) -> Result<T, ConfigError> {
    val.trim()
        .parse()
        .map_err(|_| ConfigError::EnvError(format!("{} has invalid value '{}'", key, val)))
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderKind;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_explicit_file() {
        let file = write_config(
            r#"
[provider]
kind = "twilio_sms"

[provider.twilio]
account_sid = "AC123"
auth_token = "secret"
from_number = "+15005550006"
"#,
        );

        let config = ConfigLoader::with_path(file.path())
            .load_with(lookup_from(&[]))
            .unwrap();

        assert_eq!(config.provider.kind, ProviderKind::TwilioSms);
        assert_eq!(config.provider.twilio.account_sid, "AC123");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config(
            r#"
[dispatch]
min_interval_ms = 500
"#,
        );

        let config = ConfigLoader::with_path(file.path())
            .load_with(lookup_from(&[
                ("HERALD_PROVIDER", "whatsapp"),
                ("HERALD_MIN_INTERVAL_MS", "50"),
                ("HERALD_DEFAULT_COUNTRY_CODE", "+44"),
                ("TWILIO_ACCOUNT_SID", "AC999"),
            ]))
            .unwrap();

        assert_eq!(config.provider.kind, ProviderKind::TwilioWhatsapp);
        assert_eq!(config.dispatch.min_interval_ms, 50);
        assert_eq!(config.dispatch.default_country_code, "44");
        assert_eq!(config.provider.twilio.account_sid, "AC999");
    }

    #[test]
    fn test_invalid_env_value_is_reported() {
        let file = write_config("");
        let err = ConfigLoader::with_path(file.path())
            .load_with(lookup_from(&[("HERALD_MAX_IN_FLIGHT", "many")]))
            .unwrap_err();

        assert!(matches!(err, ConfigError::EnvError(_)));
        assert!(err.to_string().contains("HERALD_MAX_IN_FLIGHT"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = ConfigLoader::with_path("/definitely/not/here/herald.toml")
            .load_with(lookup_from(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(_)));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let file = write_config("[dispatch\nmin_interval_ms = ");
        let err = ConfigLoader::with_path(file.path())
            .load_with(lookup_from(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
