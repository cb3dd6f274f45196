//! Herald Configuration System
//!
//! This crate provides TOML-based configuration with environment variable override support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Environment variable error: {0}")]
    EnvError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub dispatch: DispatchConfig,
    pub http: HttpClientConfig,
}

/// Which messaging provider the transport talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Vonage (Nexmo) SMS API
    #[default]
    Vonage,
    /// Twilio Programmable SMS
    TwilioSms,
    /// Twilio WhatsApp channel
    TwilioWhatsapp,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Vonage => "vonage",
            ProviderKind::TwilioSms => "twilio_sms",
            ProviderKind::TwilioWhatsapp => "twilio_whatsapp",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "vonage" | "nexmo" => Ok(ProviderKind::Vonage),
            "twilio_sms" | "twilio" => Ok(ProviderKind::TwilioSms),
            "twilio_whatsapp" | "whatsapp" => Ok(ProviderKind::TwilioWhatsapp),
            other => Err(ConfigError::ValidationError(format!(
                "unknown provider '{}' (expected vonage, twilio_sms or twilio_whatsapp)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider selection and credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub vonage: VonageConfig,
    pub twilio: TwilioConfig,
}

/// Vonage SMS API credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VonageConfig {
    pub api_key: String,
    pub api_secret: String,
    /// Sender id shown on the handset (alphanumeric or number)
    pub from: String,
    pub base_url: String,
}

impl Default for VonageConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            from: "Herald".to_string(),
            base_url: "https://rest.nexmo.com".to_string(),
        }
    }
}

/// Twilio account used for both SMS and WhatsApp
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    /// When set, SMS is sent through the messaging service instead of `from_number`
    pub messaging_service_sid: String,
    /// WhatsApp sender, with or without the `whatsapp:` prefix
    pub whatsapp_number: String,
    pub base_url: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            messaging_service_sid: String::new(),
            whatsapp_number: "whatsapp:+14155238886".to_string(),
            base_url: "https://api.twilio.com".to_string(),
        }
    }
}

/// Dispatch loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Minimum spacing between provider calls in milliseconds (0 disables pacing)
    pub min_interval_ms: u64,
    /// Country code assumed for numbers without an international prefix
    pub default_country_code: String,
    /// Maximum provider calls in flight (1 = strictly sequential)
    pub max_in_flight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 100,
            default_country_code: "34".to_string(),
            max_in_flight: 1,
        }
    }
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            connect_timeout_ms: 10000,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check that the selected provider can actually be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider.kind {
            ProviderKind::Vonage => {
                let v = &self.provider.vonage;
                require("provider.vonage.api_key", &v.api_key)?;
                require("provider.vonage.api_secret", &v.api_secret)?;
                require("provider.vonage.from", &v.from)?;
            }
            ProviderKind::TwilioSms => {
                let t = &self.provider.twilio;
                require("provider.twilio.account_sid", &t.account_sid)?;
                require("provider.twilio.auth_token", &t.auth_token)?;
                if t.from_number.is_empty() && t.messaging_service_sid.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "provider.twilio.from_number or provider.twilio.messaging_service_sid must be set"
                            .to_string(),
                    ));
                }
            }
            ProviderKind::TwilioWhatsapp => {
                let t = &self.provider.twilio;
                require("provider.twilio.account_sid", &t.account_sid)?;
                require("provider.twilio.auth_token", &t.auth_token)?;
                require("provider.twilio.whatsapp_number", &t.whatsapp_number)?;
            }
        }

        let code = &self.dispatch.default_country_code;
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::ValidationError(format!(
                "dispatch.default_country_code must be digits only, got '{}'",
                code
            )));
        }

        if self.dispatch.max_in_flight == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.max_in_flight must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Herald Configuration
# Environment variables override these settings

[provider]
kind = "vonage"  # vonage, twilio_sms, twilio_whatsapp

[provider.vonage]
api_key = ""
api_secret = ""
from = "Herald"
base_url = "https://rest.nexmo.com"

[provider.twilio]
account_sid = ""
auth_token = ""
from_number = ""
messaging_service_sid = ""
whatsapp_number = "whatsapp:+14155238886"
base_url = "https://api.twilio.com"

[dispatch]
min_interval_ms = 100
default_country_code = "34"
max_in_flight = 1

[http]
timeout_ms = 30000
connect_timeout_ms = 10000
"#
        .to_string()
    }
}

fn require(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}
