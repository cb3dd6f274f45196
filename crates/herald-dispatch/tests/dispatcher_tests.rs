//! Dispatcher Tests
//!
//! Tests for:
//! - Result aggregation (counts, order, one result per recipient)
//! - Per-recipient failure and panic isolation
//! - Input validation before any provider call
//! - Pacing between consecutive calls
//! - Cancellation (before, between and during calls)
//! - Bounded parallel dispatch keeping recipient order
//! - Single send

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use herald_dispatch::{
    Dispatcher, DispatchError, ProviderMessageId, Recipient, SendAttributes, Transport,
    TransportError, CANCELLED_IN_FLIGHT,
};

#[derive(Debug, Clone)]
struct Call {
    destination: String,
    body: String,
    media_url: Option<String>,
}

/// Transport that records every call and follows a per-destination script
#[derive(Default)]
struct StubTransport {
    calls: parking_lot::Mutex<Vec<Call>>,
    call_times: parking_lot::Mutex<Vec<Instant>>,
    call_count: AtomicU32,
    in_flight: AtomicU32,
    peak_in_flight: AtomicU32,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delays: HashMap<String, Duration>,
    cancel_on_first_call: Option<CancellationToken>,
}

impl StubTransport {
    fn new() -> Self {
        Self::default()
    }

    fn failing_for(mut self, destination: &str) -> Self {
        self.failing.insert(destination.to_string());
        self
    }

    fn panicking_for(mut self, destination: &str) -> Self {
        self.panicking.insert(destination.to_string());
        self
    }

    fn delayed_for(mut self, destination: &str, delay: Duration) -> Self {
        self.delays.insert(destination.to_string(), delay);
        self
    }

    fn cancelling_on_first_call(mut self, token: CancellationToken) -> Self {
        self.cancel_on_first_call = Some(token);
        self
    }

    fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn peak_in_flight(&self) -> u32 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StubTransport {
    fn provider(&self) -> &'static str {
        "stub"
    }

    async fn send(
        &self,
        destination: &str,
        body: &str,
        attributes: &SendAttributes,
    ) -> Result<ProviderMessageId, TransportError> {
        self.call_times.lock().push(Instant::now());
        let n = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().push(Call {
            destination: destination.to_string(),
            body: body.to_string(),
            media_url: attributes.media_url.clone(),
        });

        if let Some(token) = &self.cancel_on_first_call {
            token.cancel();
        }

        if self.panicking.contains(destination) {
            panic!("provider exploded on {}", destination);
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(destination) {
            tokio::time::sleep(*delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(destination) {
            return Err(TransportError::Rejected {
                status: None,
                message: "Invalid number".to_string(),
            });
        }

        Ok(format!("msg-{}", n))
    }
}

fn recipients(n: usize) -> Vec<Recipient> {
    (0..n)
        .map(|i| Recipient::new(format!("61234567{}", i), format!("User{}", i)))
        .collect()
}

fn unpaced(transport: Arc<StubTransport>) -> Dispatcher {
    Dispatcher::new(transport).with_min_interval(Duration::ZERO)
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn test_all_sent_in_order() {
    let transport = Arc::new(StubTransport::new());
    let dispatcher = unpaced(transport.clone());
    let batch = recipients(4);

    let summary = dispatcher
        .dispatch_batch(&batch, "Hola {{name}}", &SendAttributes::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.total_count, 4);
    assert_eq!(summary.sent_count, 4);
    assert_eq!(summary.failed_count, 0);
    assert!(!summary.truncated);

    for (outcome, recipient) in summary.outcomes().iter().zip(&batch) {
        assert_eq!(outcome.phone_number, recipient.phone_number);
        assert_eq!(outcome.display_name, recipient.display_name);
        assert!(outcome.provider_message_id().is_some());
        assert!(outcome.error_detail().is_none());
    }

    let bodies: Vec<String> = transport.calls().into_iter().map(|c| c.body).collect();
    assert_eq!(bodies, vec!["Hola User0", "Hola User1", "Hola User2", "Hola User3"]);
}

#[tokio::test]
async fn test_single_failure_does_not_abort_batch() {
    let batch = recipients(5);
    let transport = Arc::new(StubTransport::new().failing_for(&batch[2].phone_number));
    let dispatcher = unpaced(transport.clone());

    let summary = dispatcher
        .dispatch_batch(&batch, "hi", &SendAttributes::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.total_count, 5);
    assert_eq!(summary.sent_count, 4);
    assert_eq!(summary.failed_count, 1);
    assert_eq!(transport.call_count(), 5);

    let failed = &summary.outcomes()[2];
    assert!(!failed.is_success());
    assert_eq!(failed.error_detail(), Some("Invalid number"));
    assert_eq!(failed.phone_number, batch[2].phone_number);
}

#[tokio::test]
async fn test_panicking_transport_is_isolated() {
    let batch = recipients(3);
    let transport = Arc::new(StubTransport::new().panicking_for(&batch[1].phone_number));
    let dispatcher = unpaced(transport.clone());

    let summary = dispatcher
        .dispatch_batch(&batch, "hi", &SendAttributes::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.total_count, 3);
    assert_eq!(summary.sent_count, 2);
    assert_eq!(summary.failed_count, 1);

    let detail = summary.outcomes()[1].error_detail().unwrap();
    assert!(detail.starts_with("unexpected fault: "), "got {}", detail);
    assert!(detail.contains("provider exploded"));
    assert!(summary.outcomes()[2].is_success());
}

#[tokio::test]
async fn test_template_renders_first_placeholder_only() {
    let transport = Arc::new(StubTransport::new());
    let dispatcher = unpaced(transport.clone());
    let batch = vec![
        Recipient::new("612345678", "Ana"),
        Recipient::without_name("699000111"),
    ];

    dispatcher
        .dispatch_batch(
            &batch,
            "Hi {{name}}, {{name}}!",
            &SendAttributes::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let bodies: Vec<String> = transport.calls().into_iter().map(|c| c.body).collect();
    assert_eq!(bodies, vec!["Hi Ana, {{name}}!", "Hi , {{name}}!"]);
}

#[tokio::test]
async fn test_media_url_reaches_every_call() {
    let transport = Arc::new(StubTransport::new());
    let dispatcher = unpaced(transport.clone());

    dispatcher
        .dispatch_batch(
            &recipients(2),
            "promo",
            &SendAttributes::with_media_url("https://example.com/a.jpg"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    for call in transport.calls() {
        assert_eq!(call.media_url.as_deref(), Some("https://example.com/a.jpg"));
    }
}

#[tokio::test]
async fn test_empty_phone_is_recorded_as_failure() {
    let transport = Arc::new(StubTransport::new());
    let dispatcher = unpaced(transport.clone());
    let batch = vec![
        Recipient::new("", "Nobody"),
        Recipient::new("612345678", "Ana"),
    ];

    let summary = dispatcher
        .dispatch_batch(&batch, "hi", &SendAttributes::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.total_count, 2);
    assert_eq!(summary.failed_count, 1);
    assert!(!summary.outcomes()[0].is_success());
    assert_eq!(transport.call_count(), 1);
    assert_eq!(transport.calls()[0].destination, "612345678");
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_empty_recipient_list_rejected() {
    let transport = Arc::new(StubTransport::new());
    let dispatcher = unpaced(transport.clone());

    let err = dispatcher
        .dispatch_batch(&[], "hi", &SendAttributes::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Validation(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_empty_template_rejected() {
    let transport = Arc::new(StubTransport::new());
    let dispatcher = unpaced(transport.clone());

    let err = dispatcher
        .dispatch_batch(&recipients(2), "", &SendAttributes::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(transport.call_count(), 0);
}

// ============================================================================
// Pacing
// ============================================================================

#[tokio::test]
async fn test_calls_are_spaced_by_min_interval() {
    let interval = Duration::from_millis(60);
    let transport = Arc::new(StubTransport::new());
    let dispatcher = Dispatcher::new(transport.clone()).with_min_interval(interval);

    let start = Instant::now();
    dispatcher
        .dispatch_batch(&recipients(3), "hi", &SendAttributes::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(start.elapsed() >= interval * 2);

    let times = transport.call_times.lock().clone();
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(gap >= interval, "gap {:?}", gap);
    }
}

#[tokio::test]
async fn test_parallel_calls_are_still_spaced() {
    let interval = Duration::from_millis(60);
    let batch = recipients(4);
    let mut stub = StubTransport::new();
    for r in &batch {
        stub = stub.delayed_for(&r.phone_number, Duration::from_millis(100));
    }
    let transport = Arc::new(stub);
    let dispatcher = Dispatcher::new(transport.clone())
        .with_min_interval(interval)
        .with_max_in_flight(4);

    let start = Instant::now();
    dispatcher
        .dispatch_batch(&batch, "hi", &SendAttributes::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(start.elapsed() >= interval * 3);
    assert!(transport.peak_in_flight() >= 2);

    let mut times = transport.call_times.lock().clone();
    times.sort();
    for pair in times.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(gap >= interval, "gap {:?}", gap);
    }
}

#[tokio::test]
async fn test_slow_call_does_not_add_pacing_delay() {
    let interval = Duration::from_millis(50);
    let batch = recipients(2);
    let transport = Arc::new(
        StubTransport::new().delayed_for(&batch[0].phone_number, Duration::from_millis(150)),
    );
    let dispatcher = Dispatcher::new(transport.clone()).with_min_interval(interval);

    dispatcher
        .dispatch_batch(&batch, "hi", &SendAttributes::default(), &CancellationToken::new())
        .await
        .unwrap();

    let times = transport.call_times.lock().clone();
    let gap = times[1].duration_since(times[0]);
    // Second call starts right after the slow first one returns.
    assert!(gap >= Duration::from_millis(150));
    assert!(gap < Duration::from_millis(150) + interval, "gap {:?}", gap);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_start() {
    let transport = Arc::new(StubTransport::new());
    let dispatcher = unpaced(transport.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = dispatcher
        .dispatch_batch(&recipients(3), "hi", &SendAttributes::default(), &cancel)
        .await
        .unwrap();

    assert_eq!(summary.total_count, 0);
    assert!(summary.truncated);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_cancel_after_first_call_stops_the_batch() {
    let cancel = CancellationToken::new();
    let transport = Arc::new(StubTransport::new().cancelling_on_first_call(cancel.clone()));
    let dispatcher = unpaced(transport.clone());

    let summary = dispatcher
        .dispatch_batch(&recipients(5), "hi", &SendAttributes::default(), &cancel)
        .await
        .unwrap();

    assert!(summary.truncated);
    assert_eq!(summary.total_count, 1);
    assert_eq!(summary.sent_count, 1);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_cancel_during_pacing_wait() {
    let transport = Arc::new(StubTransport::new());
    let dispatcher =
        Dispatcher::new(transport.clone()).with_min_interval(Duration::from_secs(30));
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let start = Instant::now();
    let summary = dispatcher
        .dispatch_batch(&recipients(3), "hi", &SendAttributes::default(), &cancel)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(summary.truncated);
    assert_eq!(summary.total_count, 1);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_cancel_during_provider_call() {
    let batch = recipients(3);
    let transport = Arc::new(
        StubTransport::new().delayed_for(&batch[0].phone_number, Duration::from_secs(30)),
    );
    let dispatcher = unpaced(transport.clone());
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let summary = dispatcher
        .dispatch_batch(&batch, "hi", &SendAttributes::default(), &cancel)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert!(summary.truncated);
    assert_eq!(summary.total_count, 1);
    assert_eq!(summary.failed_count, 1);
    assert_eq!(summary.outcomes()[0].error_detail(), Some(CANCELLED_IN_FLIGHT));
    assert_eq!(transport.call_count(), 1);
}

// ============================================================================
// Parallel dispatch
// ============================================================================

#[tokio::test]
async fn test_sequential_by_default() {
    let batch = recipients(3);
    let mut stub = StubTransport::new();
    for r in &batch {
        stub = stub.delayed_for(&r.phone_number, Duration::from_millis(20));
    }
    let transport = Arc::new(stub);
    let dispatcher = unpaced(transport.clone());

    dispatcher
        .dispatch_batch(&batch, "hi", &SendAttributes::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(transport.peak_in_flight(), 1);
}

#[tokio::test]
async fn test_parallel_keeps_recipient_order() {
    let batch = recipients(3);
    let transport = Arc::new(
        StubTransport::new()
            .delayed_for(&batch[0].phone_number, Duration::from_millis(150))
            .delayed_for(&batch[1].phone_number, Duration::from_millis(80))
            .delayed_for(&batch[2].phone_number, Duration::from_millis(20))
            .failing_for(&batch[1].phone_number),
    );
    let dispatcher = unpaced(transport.clone()).with_max_in_flight(3);

    let summary = dispatcher
        .dispatch_batch(&batch, "hi", &SendAttributes::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(transport.peak_in_flight() >= 2);
    assert_eq!(summary.total_count, 3);
    assert_eq!(summary.sent_count, 2);
    assert_eq!(summary.failed_count, 1);

    let phones: Vec<&str> = summary
        .outcomes()
        .iter()
        .map(|o| o.phone_number.as_str())
        .collect();
    let expected: Vec<&str> = batch.iter().map(|r| r.phone_number.as_str()).collect();
    assert_eq!(phones, expected);
    assert!(!summary.outcomes()[1].is_success());
}

#[tokio::test]
async fn test_zero_max_in_flight_is_clamped() {
    let transport = Arc::new(StubTransport::new());
    let dispatcher = unpaced(transport.clone()).with_max_in_flight(0);

    let summary = dispatcher
        .dispatch_batch(&recipients(2), "hi", &SendAttributes::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.total_count, 2);
}

// ============================================================================
// Single send
// ============================================================================

#[tokio::test]
async fn test_send_single_success() {
    let transport = Arc::new(StubTransport::new());
    let dispatcher = Dispatcher::new(transport.clone());

    let outcome = dispatcher
        .send_single("612345678", "Hola {{name}}", &SendAttributes::default())
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.provider_message_id(), Some("msg-1"));
    // Single sends are not personalized.
    assert_eq!(transport.calls()[0].body, "Hola {{name}}");
}

#[tokio::test]
async fn test_send_single_provider_failure_is_an_outcome() {
    let transport = Arc::new(StubTransport::new().failing_for("612345678"));
    let dispatcher = Dispatcher::new(transport.clone());

    let outcome = dispatcher
        .send_single("612345678", "hi", &SendAttributes::default())
        .await
        .unwrap();

    assert!(!outcome.is_success());
    assert_eq!(outcome.error_detail(), Some("Invalid number"));
}

#[tokio::test]
async fn test_send_single_requires_both_fields() {
    let transport = Arc::new(StubTransport::new());
    let dispatcher = Dispatcher::new(transport.clone());

    let err = dispatcher
        .send_single("", "hi", &SendAttributes::default())
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = dispatcher
        .send_single("612345678", "", &SendAttributes::default())
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert_eq!(transport.call_count(), 0);
}
