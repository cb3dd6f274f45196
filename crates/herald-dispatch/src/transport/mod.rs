//! Transport adapters - one outbound provider call per message
//!
//! Each variant owns its credentials and HTTP client, formats the destination
//! into the provider's shape, and maps the provider's response into either a
//! message id or a [`TransportError`]. Adapters never retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use herald_config::{AppConfig, HttpClientConfig, ProviderKind};
use reqwest::Client;
use thiserror::Error;
use tracing::info;

use crate::error::DispatchError;

pub mod twilio;
pub mod vonage;

pub use twilio::{TwilioChannel, TwilioTransport};
pub use vonage::VonageSmsTransport;

/// Identifier the provider assigned to an accepted message
pub type ProviderMessageId = String;

/// Optional per-message attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendAttributes {
    /// Public URL of an image or document to attach (ignored by plain-SMS providers)
    pub media_url: Option<String>,
}

impl SendAttributes {
    pub fn with_media_url(media_url: impl Into<String>) -> Self {
        Self {
            media_url: Some(media_url.into()),
        }
    }
}

/// Failure of a single provider call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    /// Provider answered but refused the message
    #[error("{message}")]
    Rejected { status: Option<u16>, message: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Network(format!("Connection error: {}", e))
        } else if e.is_decode() {
            TransportError::MalformedResponse(e.to_string())
        } else {
            TransportError::Network(format!("Request failed: {}", e))
        }
    }
}

/// Provider-agnostic send capability
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short provider name used in logs and metric labels
    fn provider(&self) -> &'static str;

    /// Send `body` to the caller-supplied `destination` number.
    async fn send(
        &self,
        destination: &str,
        body: &str,
        attributes: &SendAttributes,
    ) -> Result<ProviderMessageId, TransportError>;
}

/// Build the shared HTTP client used by the provider variants.
pub fn build_http_client(config: &HttpClientConfig) -> crate::Result<Client> {
    Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| DispatchError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Construct the transport selected by `config.provider.kind`.
pub fn from_config(config: &AppConfig) -> crate::Result<Arc<dyn Transport>> {
    let client = build_http_client(&config.http)?;
    let country_code = config.dispatch.default_country_code.clone();

    let transport: Arc<dyn Transport> = match config.provider.kind {
        ProviderKind::Vonage => Arc::new(VonageSmsTransport::new(
            client,
            config.provider.vonage.clone(),
            country_code,
        )),
        ProviderKind::TwilioSms => Arc::new(TwilioTransport::sms(
            client,
            config.provider.twilio.clone(),
            country_code,
        )),
        ProviderKind::TwilioWhatsapp => Arc::new(TwilioTransport::whatsapp(
            client,
            config.provider.twilio.clone(),
            country_code,
        )),
    };

    info!(
        provider = transport.provider(),
        timeout_ms = config.http.timeout_ms,
        "Transport initialized"
    );

    Ok(transport)
}
