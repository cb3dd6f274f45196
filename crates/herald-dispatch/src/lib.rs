//! Herald Message Dispatch
//!
//! This crate provides the bulk outbound messaging engine with:
//! - Template: `{{name}}` personalization of the message body
//! - Transport: Provider adapters for Vonage SMS, Twilio SMS and Twilio WhatsApp
//! - PacingController: Minimum spacing between provider calls
//! - Dispatcher: Batch and single-send loops with cancellation and fault isolation
//! - Model: Request and response documents for the command-line trigger

pub mod error;
pub mod template;
pub mod phone;
pub mod transport;
pub mod pacing;
pub mod dispatcher;
pub mod model;

pub use error::DispatchError;
pub use template::{render, NAME_PLACEHOLDER};
pub use phone::{format_destination, whatsapp_address};
pub use transport::{
    Transport, TransportError, SendAttributes, ProviderMessageId,
    VonageSmsTransport, TwilioTransport, TwilioChannel,
    build_http_client, from_config,
};
pub use pacing::{PacingController, Paced};
pub use dispatcher::{Dispatcher, CANCELLED_IN_FLIGHT};
pub use model::{BulkSendRequest, BulkSendResponse, SingleSendRequest, SingleSendResponse, ErrorResponse};

// Re-export the shared value types used in every dispatcher signature
pub use herald_common::{BatchSummary, DispatchOutcome, DispatchStatus, OutcomeKind, Recipient};

pub type Result<T> = std::result::Result<T, DispatchError>;
