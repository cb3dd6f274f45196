use serde::{Deserialize, Serialize};

pub mod logging;

// ============================================================================
// Core Dispatch Types
// ============================================================================

/// One destination of a batch send.
///
/// Field names on the wire follow the inbound request format
/// (`{"phone": "...", "name": "..."}`); the long-form names are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(rename = "phone", alias = "phoneNumber")]
    pub phone_number: String,
    #[serde(rename = "name", alias = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Recipient {
    pub fn new(phone_number: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            display_name: Some(display_name.into()),
        }
    }

    /// Recipient with no display name; renders as an empty string.
    pub fn without_name(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            display_name: None,
        }
    }

    pub fn display_name_or_empty(&self) -> &str {
        self.display_name.as_deref().unwrap_or("")
    }
}

/// Per-recipient result. The status carries either the provider message id or
/// the error detail, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum DispatchStatus {
    #[serde(rename = "success")]
    Success {
        #[serde(rename = "messageId")]
        provider_message_id: String,
    },
    #[serde(rename = "failed")]
    Failure {
        #[serde(rename = "error")]
        error_detail: String,
    },
}

impl DispatchStatus {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            DispatchStatus::Success { .. } => OutcomeKind::Success,
            DispatchStatus::Failure { .. } => OutcomeKind::Failed,
        }
    }
}

/// Outcome of dispatching to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    #[serde(rename = "phone")]
    pub phone_number: String,
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub status: DispatchStatus,
}

impl DispatchOutcome {
    pub fn success(recipient: &Recipient, provider_message_id: impl Into<String>) -> Self {
        Self {
            phone_number: recipient.phone_number.clone(),
            display_name: recipient.display_name.clone(),
            status: DispatchStatus::Success {
                provider_message_id: provider_message_id.into(),
            },
        }
    }

    pub fn failure(recipient: &Recipient, error_detail: impl Into<String>) -> Self {
        Self {
            phone_number: recipient.phone_number.clone(),
            display_name: recipient.display_name.clone(),
            status: DispatchStatus::Failure {
                error_detail: error_detail.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.kind() == OutcomeKind::Success
    }

    pub fn provider_message_id(&self) -> Option<&str> {
        match &self.status {
            DispatchStatus::Success { provider_message_id } => Some(provider_message_id),
            DispatchStatus::Failure { .. } => None,
        }
    }

    pub fn error_detail(&self) -> Option<&str> {
        match &self.status {
            DispatchStatus::Success { .. } => None,
            DispatchStatus::Failure { error_detail } => Some(error_detail),
        }
    }
}

// ============================================================================
// Result Aggregation
// ============================================================================

/// Aggregate report for one batch run.
///
/// Built once by [`BatchSummary::fold`]; `total_count == sent_count + failed_count`
/// and `outcomes` keeps the input recipient order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total_count: usize,
    pub sent_count: usize,
    pub failed_count: usize,
    /// Set when the batch was cancelled before every recipient was processed.
    pub truncated: bool,
    pub outcomes: Vec<DispatchOutcome>,
}

impl BatchSummary {
    /// Fold per-recipient outcomes (already in recipient order) into a summary.
    pub fn fold(outcomes: Vec<DispatchOutcome>, truncated: bool) -> Self {
        let sent_count = outcomes.iter().filter(|o| o.is_success()).count();
        let failed_count = outcomes.len() - sent_count;

        Self {
            total_count: outcomes.len(),
            sent_count,
            failed_count,
            truncated,
            outcomes,
        }
    }

    pub fn outcomes(&self) -> &[DispatchOutcome] {
        &self.outcomes
    }
}
