//! Twilio Messages API transport (SMS and WhatsApp)
//!
//! `POST {base_url}/2010-04-01/Accounts/{sid}/Messages.json` with HTTP basic
//! auth. The WhatsApp channel uses the same endpoint with `whatsapp:`
//! addresses on both ends.

use async_trait::async_trait;
use herald_config::TwilioConfig;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ProviderMessageId, SendAttributes, Transport, TransportError};
use crate::phone::{ensure_whatsapp_scheme, format_destination, whatsapp_address};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwilioChannel {
    Sms,
    WhatsApp,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
    status: Option<String>,
    error_code: Option<i64>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<i64>,
    message: Option<String>,
}

pub struct TwilioTransport {
    client: Client,
    config: TwilioConfig,
    channel: TwilioChannel,
    default_country_code: String,
}

impl TwilioTransport {
    pub fn sms(client: Client, config: TwilioConfig, default_country_code: impl Into<String>) -> Self {
        Self::new(client, config, TwilioChannel::Sms, default_country_code)
    }

    pub fn whatsapp(client: Client, config: TwilioConfig, default_country_code: impl Into<String>) -> Self {
        Self::new(client, config, TwilioChannel::WhatsApp, default_country_code)
    }

    pub fn new(
        client: Client,
        config: TwilioConfig,
        channel: TwilioChannel,
        default_country_code: impl Into<String>,
    ) -> Self {
        Self {
            client,
            config,
            channel,
            default_country_code: default_country_code.into(),
        }
    }

    /// Messages resource URL; the account SID is percent-encoded as one path segment.
    fn endpoint(&self) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.config.base_url).map_err(|e| {
            TransportError::Network(format!("Invalid Twilio base URL '{}': {}", self.config.base_url, e))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                TransportError::Network(format!("Twilio base URL '{}' cannot carry a path", self.config.base_url))
            })?
            .pop_if_empty()
            .extend(["2010-04-01", "Accounts", self.config.account_sid.as_str(), "Messages.json"]);

        Ok(url)
    }

    fn destination(&self, raw: &str) -> String {
        match self.channel {
            TwilioChannel::Sms => format_destination(raw, &self.default_country_code),
            TwilioChannel::WhatsApp => whatsapp_address(raw, &self.default_country_code),
        }
    }

    /// Sender form field: messaging service, plain number, or WhatsApp sender.
    fn sender(&self) -> (&'static str, String) {
        match self.channel {
            TwilioChannel::Sms if !self.config.messaging_service_sid.is_empty() => {
                ("MessagingServiceSid", self.config.messaging_service_sid.clone())
            }
            TwilioChannel::Sms => ("From", self.config.from_number.clone()),
            TwilioChannel::WhatsApp => ("From", ensure_whatsapp_scheme(&self.config.whatsapp_number)),
        }
    }
}

#[async_trait]
impl Transport for TwilioTransport {
    fn provider(&self) -> &'static str {
        match self.channel {
            TwilioChannel::Sms => "twilio_sms",
            TwilioChannel::WhatsApp => "twilio_whatsapp",
        }
    }

    async fn send(
        &self,
        destination: &str,
        body: &str,
        attributes: &SendAttributes,
    ) -> Result<ProviderMessageId, TransportError> {
        let to = self.destination(destination);
        let (sender_field, sender) = self.sender();

        let mut params: Vec<(&str, String)> = vec![
            ("To", to.clone()),
            (sender_field, sender),
            ("Body", body.to_string()),
        ];
        if let Some(ref media_url) = attributes.media_url {
            params.push(("MediaUrl", media_url.clone()));
        }

        let response = self
            .client
            .post(self.endpoint()?)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiError>(&text) {
                Ok(ApiError { code: Some(code), message: Some(message) }) => {
                    format!("Twilio error {}: {}", code, message)
                }
                Ok(ApiError { message: Some(message), .. }) => message,
                _ => format!("HTTP {}", status.as_u16()),
            };
            debug!(to = %to, "Twilio request failed for destination");
            warn!(status_code = status.as_u16(), error = %message, "Twilio request failed");
            return Err(TransportError::Rejected {
                status: Some(status.as_u16()),
                message,
            });
        }

        let resource: MessageResource = serde_json::from_str(&text)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        if let Some(state) = resource.status.as_deref() {
            if state == "failed" || state == "undelivered" {
                let message = match (resource.error_code, resource.error_message) {
                    (Some(code), Some(message)) => format!("Twilio error {}: {}", code, message),
                    (_, Some(message)) => message,
                    (Some(code), None) => format!("Twilio error {}", code),
                    (None, None) => format!("Message {}", state),
                };
                debug!(to = %to, "Twilio reported failure for destination");
                warn!(provider_status = state, error = %message, "Twilio reported message failure");
                return Err(TransportError::Rejected {
                    status: None,
                    message,
                });
            }
        }

        let sid = resource.sid.filter(|sid| !sid.is_empty()).ok_or_else(|| {
            TransportError::MalformedResponse("response contains no message sid".to_string())
        })?;

        debug!(to = %to, sid = %sid, status = ?resource.status, "Twilio accepted message");
        Ok(sid)
    }
}
