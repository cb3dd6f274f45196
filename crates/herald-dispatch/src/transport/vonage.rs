//! Vonage (Nexmo) SMS API transport
//!
//! `POST {base_url}/sms/json` with form-encoded credentials. The API answers
//! HTTP 200 even for rejected messages; the verdict is in
//! `messages[0].status`, where `"0"` means accepted.

use async_trait::async_trait;
use herald_config::VonageConfig;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ProviderMessageId, SendAttributes, Transport, TransportError};
use crate::phone::format_destination;

const ACCEPTED_STATUS: &str = "0";
const DEFAULT_ERROR_TEXT: &str = "Error sending SMS";

#[derive(Debug, Deserialize)]
struct SmsResponse {
    #[serde(default)]
    messages: Vec<MessageStatus>,
}

#[derive(Debug, Deserialize)]
struct MessageStatus {
    status: String,
    #[serde(rename = "message-id")]
    message_id: Option<String>,
    #[serde(rename = "error-text")]
    error_text: Option<String>,
}

pub struct VonageSmsTransport {
    client: Client,
    config: VonageConfig,
    default_country_code: String,
}

impl VonageSmsTransport {
    pub fn new(client: Client, config: VonageConfig, default_country_code: impl Into<String>) -> Self {
        Self {
            client,
            config,
            default_country_code: default_country_code.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/sms/json", self.config.base_url.trim_end_matches('/'))
    }

    /// Vonage expects international format without the leading `+`.
    fn destination(&self, raw: &str) -> String {
        format_destination(raw, &self.default_country_code)
            .trim_start_matches('+')
            .to_string()
    }
}

#[async_trait]
impl Transport for VonageSmsTransport {
    fn provider(&self) -> &'static str {
        "vonage"
    }

    async fn send(
        &self,
        destination: &str,
        body: &str,
        attributes: &SendAttributes,
    ) -> Result<ProviderMessageId, TransportError> {
        let to = self.destination(destination);

        if attributes.media_url.is_some() {
            debug!(to = %to, "Vonage SMS does not support media, sending text only");
        }

        let params = [
            ("api_key", self.config.api_key.as_str()),
            ("api_secret", self.config.api_secret.as_str()),
            ("to", to.as_str()),
            ("from", self.config.from.as_str()),
            ("text", body),
        ];

        let response = self.client.post(self.endpoint()).form(&params).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed = serde_json::from_str::<SmsResponse>(&text);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|r| r.messages.into_iter().next())
                .and_then(|m| m.error_text)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            debug!(to = %to, "Vonage request failed for destination");
            warn!(status_code = status.as_u16(), error = %message, "Vonage request failed");
            return Err(TransportError::Rejected {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed = parsed.map_err(|e| TransportError::MalformedResponse(e.to_string()))?;
        let first = parsed.messages.into_iter().next().ok_or_else(|| {
            TransportError::MalformedResponse("response contains no message status".to_string())
        })?;

        if first.status != ACCEPTED_STATUS {
            let message = first
                .error_text
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_ERROR_TEXT.to_string());
            debug!(to = %to, "Vonage rejected destination");
            warn!(provider_status = %first.status, error = %message, "Vonage rejected message");
            return Err(TransportError::Rejected {
                status: None,
                message,
            });
        }

        let message_id = first.message_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            TransportError::MalformedResponse("accepted message has no message-id".to_string())
        })?;

        debug!(to = %to, message_id = %message_id, "Vonage accepted message");
        Ok(message_id)
    }
}
