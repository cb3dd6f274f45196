//! Request and response documents for the dispatch triggers
//!
//! Field names match the JSON accepted and produced by the `herald` CLI
//! (`recipients`, `messageTemplate`, `mediaUrl` in, `success`/`total`/`sent`/
//! `failed`/`results` out).

use herald_common::{BatchSummary, DispatchOutcome, DispatchStatus, Recipient};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::Result;
use crate::transport::SendAttributes;

/// Bulk send input
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendRequest {
    #[serde(default)]
    pub recipients: Option<Vec<Recipient>>,
    #[serde(default)]
    pub message_template: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
}

impl BulkSendRequest {
    /// Split into dispatcher arguments, rejecting absent fields.
    ///
    /// An empty list or empty template passes here and is rejected by the
    /// dispatcher itself.
    pub fn into_parts(self) -> Result<(Vec<Recipient>, String, SendAttributes)> {
        let mut missing = Vec::new();
        if self.recipients.is_none() {
            missing.push("recipients");
        }
        if self.message_template.is_none() {
            missing.push("messageTemplate");
        }

        match (self.recipients, self.message_template) {
            (Some(recipients), Some(template)) => {
                Ok((recipients, template, attributes_for(self.media_url)))
            }
            _ => Err(DispatchError::Validation(format!(
                "Missing parameters: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Single send input, assembled from command-line arguments
#[derive(Debug, Clone, Default)]
pub struct SingleSendRequest {
    pub to: String,
    pub message: String,
    pub media_url: Option<String>,
}

impl SingleSendRequest {
    pub fn attributes(&self) -> SendAttributes {
        attributes_for(self.media_url.clone())
    }
}

fn attributes_for(media_url: Option<String>) -> SendAttributes {
    SendAttributes {
        media_url: media_url.filter(|url| !url.trim().is_empty()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkSendResponse {
    pub success: bool,
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    pub results: Vec<DispatchOutcome>,
}

impl From<BatchSummary> for BulkSendResponse {
    fn from(summary: BatchSummary) -> Self {
        Self {
            success: true,
            total: summary.total_count,
            sent: summary.sent_count,
            failed: summary.failed_count,
            truncated: summary.truncated,
            results: summary.outcomes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

impl From<&DispatchError> for ErrorResponse {
    fn from(e: &DispatchError) -> Self {
        match e {
            DispatchError::Validation(message) => Self::new(message.clone()),
            other => Self::new(other.to_string()),
        }
    }
}

/// `{"success": true, "messageId": ...}` or `{"error": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SingleSendResponse {
    Sent {
        success: bool,
        #[serde(rename = "messageId")]
        message_id: String,
    },
    Failed(ErrorResponse),
}

impl SingleSendResponse {
    pub fn from_outcome(outcome: &DispatchOutcome) -> Self {
        match &outcome.status {
            DispatchStatus::Success { provider_message_id } => SingleSendResponse::Sent {
                success: true,
                message_id: provider_message_id.clone(),
            },
            DispatchStatus::Failure { error_detail } => {
                SingleSendResponse::Failed(ErrorResponse::new(error_detail.clone()))
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SingleSendResponse::Sent { .. })
    }
}
