//! Dispatcher - bulk and single message delivery
//!
//! Drives render -> pace -> send -> classify for every recipient, converting
//! every per-recipient fault (provider rejection, network error, panic inside
//! the adapter) into a failure outcome so one bad recipient never aborts the
//! batch. Only input validation fails the whole call.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{stream, FutureExt, StreamExt};
use herald_common::{BatchSummary, DispatchOutcome, Recipient};
use herald_config::DispatchConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::DispatchError;
use crate::Result;
use crate::pacing::{Paced, PacingController};
use crate::template::render;
use crate::transport::{SendAttributes, Transport};

/// Detail recorded when cancellation interrupts a provider call.
pub const CANCELLED_IN_FLIGHT: &str = "cancelled while awaiting provider response";

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    min_interval: Duration,
    max_in_flight: usize,
}

impl Dispatcher {
    /// Sequential dispatcher with the default 100ms spacing.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            min_interval: Duration::from_millis(100),
            max_in_flight: 1,
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &DispatchConfig) -> Self {
        Self::new(transport)
            .with_min_interval(Duration::from_millis(config.min_interval_ms))
            .with_max_in_flight(config.max_in_flight)
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Allow up to `max_in_flight` concurrent provider calls. Pacing still
    /// gates every call start and outcomes stay in recipient order.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn provider(&self) -> &'static str {
        self.transport.provider()
    }

    /// Send a personalized message to every recipient.
    ///
    /// Fails with [`DispatchError::Validation`] before any provider call when
    /// `recipients` or `template` is empty. Once iteration starts the call
    /// always returns a summary; when `cancel` fires, the summary covers the
    /// recipients processed so far and is marked truncated.
    pub async fn dispatch_batch(
        &self,
        recipients: &[Recipient],
        template: &str,
        attributes: &SendAttributes,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary> {
        if recipients.is_empty() {
            return Err(DispatchError::Validation(
                "recipients must be a non-empty list".to_string(),
            ));
        }
        if template.is_empty() {
            return Err(DispatchError::Validation(
                "message template must not be empty".to_string(),
            ));
        }

        let span = info_span!(
            "dispatch_batch",
            batch_size = recipients.len(),
            provider = self.provider(),
            max_in_flight = self.max_in_flight,
        );

        async move {
            info!(min_interval_ms = self.min_interval.as_millis() as u64, "Starting batch dispatch");

            let pacing = PacingController::new(self.min_interval);
            let pacing = &pacing;

            let slots: Vec<Option<DispatchOutcome>> = stream::iter(recipients.iter().enumerate())
                .map(|(index, recipient)| async move {
                    if cancel.is_cancelled() {
                        return None;
                    }

                    let body = render(template, recipient);

                    if pacing.before_next_call(cancel).await == Paced::Cancelled {
                        debug!(recipient_index = index, "Cancelled while waiting for pacing");
                        return None;
                    }

                    let outcome = self.deliver(recipient, &body, attributes, cancel).await;
                    debug!(
                        recipient_index = index,
                        success = outcome.is_success(),
                        "Recipient processed"
                    );
                    Some(outcome)
                })
                .buffered(self.max_in_flight)
                .collect()
                .await;

            let truncated = slots.iter().any(Option::is_none);
            let summary = BatchSummary::fold(slots.into_iter().flatten().collect(), truncated);

            metrics::counter!(
                "herald_batches_total",
                "outcome" => if truncated { "truncated" } else { "completed" }
            )
            .increment(1);

            if truncated {
                warn!(
                    processed = summary.total_count,
                    requested = recipients.len(),
                    sent = summary.sent_count,
                    failed = summary.failed_count,
                    "Batch dispatch cancelled"
                );
            } else {
                info!(
                    total = summary.total_count,
                    sent = summary.sent_count,
                    failed = summary.failed_count,
                    "Batch dispatch finished"
                );
            }

            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Send one literal message to one number, without pacing.
    ///
    /// Shares the send/classify path with [`Dispatcher::dispatch_batch`]; only
    /// missing input is an error, a provider failure comes back as a failure
    /// outcome.
    pub async fn send_single(
        &self,
        to: &str,
        message: &str,
        attributes: &SendAttributes,
    ) -> Result<DispatchOutcome> {
        if to.trim().is_empty() || message.is_empty() {
            return Err(DispatchError::Validation(
                "both destination and message are required".to_string(),
            ));
        }

        let recipient = Recipient::without_name(to);
        let outcome = self
            .deliver(&recipient, message, attributes, &CancellationToken::new())
            .await;

        info!(
            provider = self.provider(),
            success = outcome.is_success(),
            "Single message dispatched"
        );

        Ok(outcome)
    }

    /// One provider call, with every fault converted into an outcome.
    async fn deliver(
        &self,
        recipient: &Recipient,
        body: &str,
        attributes: &SendAttributes,
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let provider = self.provider();

        if recipient.phone_number.trim().is_empty() {
            metrics::counter!("herald_messages_failed_total", "provider" => provider).increment(1);
            return DispatchOutcome::failure(recipient, "recipient phone number is empty");
        }

        let started = Instant::now();
        let call = AssertUnwindSafe(self.transport.send(&recipient.phone_number, body, attributes))
            .catch_unwind();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(to = %recipient.phone_number, "Abandoned call destination");
                warn!(provider, "Provider call abandoned on cancellation");
                metrics::counter!("herald_messages_failed_total", "provider" => provider).increment(1);
                return DispatchOutcome::failure(recipient, CANCELLED_IN_FLIGHT);
            }
            result = call => result,
        };

        metrics::histogram!("herald_provider_call_seconds", "provider" => provider)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(Ok(message_id)) => {
                metrics::counter!("herald_messages_sent_total", "provider" => provider).increment(1);
                debug!(to = %recipient.phone_number, message_id = %message_id, "Message accepted");
                DispatchOutcome::success(recipient, message_id)
            }
            Ok(Err(e)) => {
                metrics::counter!("herald_messages_failed_total", "provider" => provider).increment(1);
                debug!(to = %recipient.phone_number, "Failed message destination");
                warn!(provider, error = %e, "Message failed");
                DispatchOutcome::failure(recipient, e.to_string())
            }
            Err(panic) => {
                metrics::counter!("herald_messages_failed_total", "provider" => provider).increment(1);
                let detail = format!("unexpected fault: {}", panic_message(panic.as_ref()));
                debug!(to = %recipient.phone_number, "Panicked call destination");
                warn!(provider, error = %detail, "Transport panicked");
                DispatchOutcome::failure(recipient, detail)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "panic without message"
    }
}
