//! The message pump.
//!
//! Consumes one ordered delivery stream, runs the handler, and publishes
//! results to the emitting exchange.
//!
//! ## Per-Message Pipeline
//!
//! | Stage   | On failure                     |
//! |---------|--------------------------------|
//! | decode  | warn, count as dropped, ack    |
//! | handle  | warn, count as dropped, ack    |
//! | encode  | warn, count as dropped, ack    |
//! | publish | warn, count as publish failure, ack |
//!
//! A consumer stream error or the end of the stream stops the pump with an
//! error. Cancellation stops it cleanly between messages.

use futures::{Stream, StreamExt};
use schemabus_core::{Delivery, ExchangeName, Publisher};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::marker::PhantomData;
use std::ops::AddAssign;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Pump lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    /// Consuming deliveries
    Running,
    /// No longer consuming
    Stopped,
}

/// Counters reported when a pump stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Results published
    pub processed: u64,
    /// Messages dropped at decode, handle, or encode
    pub dropped: u64,
    /// Results whose publish failed
    pub publish_failures: u64,
}

impl AddAssign for PumpStats {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.dropped += other.dropped;
        self.publish_failures += other.publish_failures;
    }
}

/// Why a single message produced nothing.
#[derive(Debug, thiserror::Error)]
enum MessageError {
    #[error("can not decode payload: {0}")]
    Decode(String),
    #[error("handler failed: {0}")]
    Handler(String),
    #[error("can not encode result: {0}")]
    Encode(String),
}

impl MessageError {
    fn stage(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Handler(_) => "handle",
            Self::Encode(_) => "encode",
        }
    }
}

/// Transforms deliveries of `In` into published `Out` values.
pub struct MessagePump<In, Out, F> {
    publisher: Arc<dyn Publisher>,
    handler: Arc<F>,
    emitting: ExchangeName,
    auto_ack: bool,
    state: PumpState,
    stats: PumpStats,
    _types: PhantomData<fn(In) -> Out>,
}

impl<In, Out, F, E> MessagePump<In, Out, F>
where
    In: DeserializeOwned,
    Out: Serialize,
    F: Fn(In) -> Result<Out, E> + Send + Sync,
    E: Display,
{
    /// Create a pump publishing to `emitting`. With `auto_ack` the
    /// deliveries are assumed consumed in no-ack mode and are not acked.
    #[must_use]
    pub fn new(
        publisher: Arc<dyn Publisher>,
        handler: Arc<F>,
        emitting: ExchangeName,
        auto_ack: bool,
    ) -> Self {
        Self {
            publisher,
            handler,
            emitting,
            auto_ack,
            state: PumpState::Running,
            stats: PumpStats::default(),
            _types: PhantomData,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PumpState {
        self.state
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> PumpStats {
        self.stats
    }

    /// Consume `deliveries` until the stream fails, ends, or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns error if the consumer stream fails or ends. The counters up
    /// to that point remain available through [`MessagePump::stats`].
    pub async fn run<S, D, T>(
        &mut self,
        mut deliveries: S,
        cancel: CancellationToken,
    ) -> Result<PumpStats, PumpError>
    where
        S: Stream<Item = Result<D, T>> + Unpin,
        D: Delivery,
        T: Display,
    {
        self.state = PumpState::Running;
        tracing::info!(exchange = %self.emitting, auto_ack = self.auto_ack, "Pump running");

        let outcome = loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break Ok(self.stats),
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(delivery)) => self.process(&delivery).await,
                Some(Err(err)) => break Err(PumpError::Transport(err.to_string())),
                None => break Err(PumpError::Closed),
            }
        };

        self.state = PumpState::Stopped;
        match &outcome {
            Ok(stats) => tracing::info!(
                processed = stats.processed,
                dropped = stats.dropped,
                publish_failures = stats.publish_failures,
                "Pump stopped"
            ),
            Err(err) => tracing::error!(error = %err, "Pump stopped"),
        }
        outcome
    }

    async fn process<D: Delivery>(&mut self, delivery: &D) {
        let tag = delivery.tag();

        match self.transform(delivery.payload()) {
            Ok(body) => match self.publisher.publish(&self.emitting, &body).await {
                Ok(()) => {
                    self.stats.processed += 1;
                    tracing::debug!(delivery_tag = tag, exchange = %self.emitting, "Result published");
                }
                Err(err) => {
                    self.stats.publish_failures += 1;
                    tracing::warn!(
                        delivery_tag = tag,
                        exchange = %self.emitting,
                        error = %err,
                        "Failed to publish result"
                    );
                }
            },
            Err(err) => {
                self.stats.dropped += 1;
                tracing::warn!(delivery_tag = tag, stage = err.stage(), error = %err, "Dropping message");
            }
        }

        if !self.auto_ack {
            if let Err(err) = delivery.ack().await {
                tracing::warn!(delivery_tag = tag, error = %err, "Failed to acknowledge message");
            }
        }
    }

    fn transform(&self, payload: &[u8]) -> Result<Vec<u8>, MessageError> {
        let input: In =
            serde_json::from_slice(payload).map_err(|e| MessageError::Decode(e.to_string()))?;
        let output = (self.handler)(input).map_err(|e| MessageError::Handler(e.to_string()))?;
        serde_json::to_vec(&output).map_err(|e| MessageError::Encode(e.to_string()))
    }
}

/// Errors that stop a pump.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PumpError {
    /// The consumer stream reported an error
    #[error("consumer stream failed: {0}")]
    Transport(String),
    /// The consumer stream ended
    #[error("consumer stream closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use schemabus_core::BrokerError;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio_test::{assert_pending, assert_ready_ok, task};

    #[derive(Deserialize)]
    struct DataIn {
        a: String,
    }

    #[derive(Serialize)]
    struct DataOut {
        b: i64,
    }

    fn double_length(input: DataIn) -> Result<DataOut, String> {
        if input.a == "reject" {
            return Err("rejected".to_string());
        }
        i64::try_from(input.a.len() * 2)
            .map(|b| DataOut { b })
            .map_err(|e| e.to_string())
    }

    struct FakeDelivery {
        tag: u64,
        payload: Vec<u8>,
        acks: Arc<Mutex<Vec<u64>>>,
    }

    #[async_trait]
    impl Delivery for FakeDelivery {
        fn payload(&self) -> &[u8] {
            &self.payload
        }

        fn tag(&self) -> u64 {
            self.tag
        }

        async fn ack(&self) -> Result<(), BrokerError> {
            self.acks.lock().unwrap().push(self.tag);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(ExchangeName, Vec<u8>)>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, exchange: &ExchangeName, payload: &[u8]) -> Result<(), BrokerError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(BrokerError::Channel("channel closed".to_string()));
            }
            self.published
                .lock()
                .unwrap()
                .push((exchange.clone(), payload.to_vec()));
            Ok(())
        }
    }

    struct Harness {
        acks: Arc<Mutex<Vec<u64>>>,
        publisher: Arc<RecordingPublisher>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                acks: Arc::new(Mutex::new(Vec::new())),
                publisher: Arc::new(RecordingPublisher::default()),
            }
        }

        fn deliveries(&self, payloads: &[&str]) -> Vec<Result<FakeDelivery, String>> {
            payloads
                .iter()
                .zip(1..)
                .map(|(payload, tag)| {
                    Ok(FakeDelivery {
                        tag,
                        payload: payload.as_bytes().to_vec(),
                        acks: self.acks.clone(),
                    })
                })
                .collect()
        }

        fn pump(
            &self,
            auto_ack: bool,
        ) -> MessagePump<DataIn, DataOut, fn(DataIn) -> Result<DataOut, String>> {
            MessagePump::new(
                self.publisher.clone(),
                Arc::new(double_length as fn(DataIn) -> Result<DataOut, String>),
                ExchangeName::new("doubled"),
                auto_ack,
            )
        }

        fn acks(&self) -> Vec<u64> {
            self.acks.lock().unwrap().clone()
        }

        fn published(&self) -> Vec<(String, serde_json::Value)> {
            self.publisher
                .published
                .lock()
                .unwrap()
                .iter()
                .map(|(exchange, body)| {
                    (
                        exchange.as_str().to_string(),
                        serde_json::from_slice(body).unwrap(),
                    )
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn doubles_input_length() {
        let harness = Harness::new();
        let mut pump = harness.pump(false);

        let err = pump
            .run(
                stream::iter(harness.deliveries(&[r#"{"a":"hi"}"#])),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PumpError::Closed));
        assert_eq!(pump.state(), PumpState::Stopped);
        assert_eq!(harness.acks(), vec![1]);
        assert_eq!(
            harness.published(),
            vec![("doubled".to_string(), serde_json::json!({"b": 4}))]
        );
        assert_eq!(pump.stats().processed, 1);
    }

    #[tokio::test]
    async fn decode_failure_does_not_block_next_message() {
        let harness = Harness::new();
        let mut pump = harness.pump(false);

        pump.run(
            stream::iter(harness.deliveries(&["not json", r#"{"b":1}"#, r#"{"a":"abc"}"#])),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(harness.acks(), vec![1, 2, 3]);
        assert_eq!(
            harness.published(),
            vec![("doubled".to_string(), serde_json::json!({"b": 6}))]
        );
        assert_eq!(
            pump.stats(),
            PumpStats {
                processed: 1,
                dropped: 2,
                publish_failures: 0,
            }
        );
    }

    #[tokio::test]
    async fn handler_failure_is_acked_and_counted() {
        let harness = Harness::new();
        let mut pump = harness.pump(false);

        pump.run(
            stream::iter(harness.deliveries(&[r#"{"a":"reject"}"#, r#"{"a":"ok"}"#])),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(harness.acks(), vec![1, 2]);
        assert_eq!(pump.stats().dropped, 1);
        assert_eq!(pump.stats().processed, 1);
    }

    #[tokio::test]
    async fn publish_failure_still_acks() {
        let harness = Harness::new();
        harness.publisher.fail.store(true, Ordering::SeqCst);
        let mut pump = harness.pump(false);

        pump.run(
            stream::iter(harness.deliveries(&[r#"{"a":"hi"}"#])),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(harness.acks(), vec![1]);
        assert!(harness.published().is_empty());
        assert_eq!(pump.stats().publish_failures, 1);
        assert_eq!(pump.stats().processed, 0);
    }

    #[tokio::test]
    async fn auto_ack_skips_explicit_acks() {
        let harness = Harness::new();
        let mut pump = harness.pump(true);

        pump.run(
            stream::iter(harness.deliveries(&[r#"{"a":"hi"}"#, "garbage"])),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(harness.acks().is_empty());
        assert_eq!(harness.published().len(), 1);
    }

    #[tokio::test]
    async fn stream_error_stops_pump() {
        let harness = Harness::new();
        let mut pump = harness.pump(false);
        let mut deliveries = harness.deliveries(&[r#"{"a":"hi"}"#]);
        deliveries.push(Err("connection reset".to_string()));
        deliveries.extend(harness.deliveries(&[r#"{"a":"never"}"#]));

        let err = pump
            .run(stream::iter(deliveries), CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            PumpError::Transport(reason) => assert!(reason.contains("connection reset")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(harness.published().len(), 1);
        assert_eq!(pump.state(), PumpState::Stopped);
    }

    #[test]
    fn idle_pump_waits_until_cancelled() {
        let harness = Harness::new();
        let mut pump = harness.pump(false);
        let cancel = CancellationToken::new();

        {
            let mut run = task::spawn(pump.run(
                stream::pending::<Result<FakeDelivery, String>>(),
                cancel.clone(),
            ));
            assert_pending!(run.poll());

            cancel.cancel();
            assert!(run.is_woken());
            let stats = assert_ready_ok!(run.poll());
            assert_eq!(stats, PumpStats::default());
        }

        assert_eq!(pump.state(), PumpState::Stopped);
    }

    #[test]
    fn stats_accumulate() {
        let mut total = PumpStats::default();
        total += PumpStats {
            processed: 2,
            dropped: 1,
            publish_failures: 0,
        };
        total += PumpStats {
            processed: 3,
            dropped: 0,
            publish_failures: 1,
        };
        assert_eq!(
            total,
            PumpStats {
                processed: 5,
                dropped: 1,
                publish_failures: 1,
            }
        );
    }
}
