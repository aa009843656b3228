use async_trait::async_trait;
use prost::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::field::Empty;
use tracing::Instrument;

use crate::flags::{int_flag, FlagProvider, KAFKA_QUEUE_PROBLEMS};
use crate::metrics::Metrics;
use crate::models::OrderResult;
use crate::proto::pb;
use crate::utils::{BackgroundTasks, CallContext, CancelReason};

// ============================================================================
// Order Event Publisher
// ============================================================================
//
// Publishing is a two-phase handshake with the broker client:
//
// 1. enqueue: hand the message over, racing the caller's cancellation
// 2. outcome: race the delivery acknowledgement (success or error) against
//    the caller's cancellation
//
// Exactly one branch decides the recorded outcome. Nothing is retried and
// nothing is returned to the caller as an error.
//
// While `kafkaQueueProblems` is above zero, that many extra copies are
// published from detached tasks that are not tied to the caller's context.
// The flag itself is read under its own short deadline, so a publish whose
// caller already gave up still decides on overload without hanging.
//
// ============================================================================

pub const ORDERS_TOPIC: &str = "orders";

const OVERLOAD_FLAG_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

/// Broker acknowledgement of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryAck {
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("broker error: {0}")]
    Broker(String),

    #[error("producer dropped the delivery acknowledgement")]
    AckDropped,
}

/// Pending acknowledgement of one enqueued message
#[derive(Debug)]
pub struct DeliveryReceipt {
    rx: oneshot::Receiver<Result<DeliveryAck, PublishError>>,
}

impl DeliveryReceipt {
    pub fn channel() -> (oneshot::Sender<Result<DeliveryAck, PublishError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    pub async fn acknowledged(self) -> Result<DeliveryAck, PublishError> {
        self.rx.await.unwrap_or(Err(PublishError::AckDropped))
    }
}

/// Broker client seam. Safe for concurrent use by many publishers.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Resolves once the client has accepted the message
    async fn enqueue(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, PublishError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPhase {
    Enqueue,
    Acknowledge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Delivered {
        partition: i32,
        offset: i64,
        elapsed: Duration,
    },
    Failed {
        phase: PublishPhase,
        reason: String,
        elapsed: Duration,
    },
    Cancelled {
        phase: PublishPhase,
        reason: CancelReason,
        elapsed: Duration,
    },
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Delivered { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            PublishOutcome::Delivered { elapsed, .. }
            | PublishOutcome::Failed { elapsed, .. }
            | PublishOutcome::Cancelled { elapsed, .. } => *elapsed,
        }
    }

    pub fn offset(&self) -> Option<i64> {
        match self {
            PublishOutcome::Delivered { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            PublishOutcome::Delivered { .. } => "success",
            PublishOutcome::Failed { .. } => "error",
            PublishOutcome::Cancelled { .. } => "cancelled",
        }
    }
}

pub struct EventPublisher {
    producer: Arc<dyn MessageProducer>,
    flags: Arc<dyn FlagProvider>,
    overload: Arc<BackgroundTasks>,
    metrics: Arc<Metrics>,
    topic: String,
}

impl EventPublisher {
    pub fn new(
        producer: Arc<dyn MessageProducer>,
        flags: Arc<dyn FlagProvider>,
        overload: Arc<BackgroundTasks>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            producer,
            flags,
            overload,
            metrics,
            topic: ORDERS_TOPIC.to_string(),
        }
    }

    /// Builds the broker message: protobuf payload plus trace headers
    pub fn message_for(&self, ctx: &CallContext, order: &OrderResult) -> OutboundMessage {
        let headers = ctx
            .trace()
            .child()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        OutboundMessage {
            topic: self.topic.clone(),
            payload: pb::OrderResult::from(order).encode_to_vec(),
            headers,
        }
    }

    pub async fn publish(&self, ctx: &CallContext, order: &OrderResult) -> PublishOutcome {
        let span = tracing::info_span!(
            "publish",
            otel.name = %format!("{} publish", self.topic),
            otel.kind = "producer",
            peer.service = "kafka",
            messaging.system = "kafka",
            messaging.operation = "publish",
            messaging.destination.name = %self.topic,
            messaging.kafka.producer.success = Empty,
            messaging.kafka.producer.duration_ms = Empty,
            messaging.kafka.message.offset = Empty,
        );

        let message = self.message_for(ctx, order);
        self.publish_message(ctx, message).instrument(span).await
    }

    async fn publish_message(&self, ctx: &CallContext, message: OutboundMessage) -> PublishOutcome {
        let started = Instant::now();

        let receipt = tokio::select! {
            biased;
            reason = ctx.cancelled() => {
                let outcome = PublishOutcome::Cancelled {
                    phase: PublishPhase::Enqueue,
                    reason,
                    elapsed: started.elapsed(),
                };
                tracing::error!(error = %reason, "Failed to send message to Kafka within context deadline");
                return self.record(outcome);
            }
            enqueued = self.producer.enqueue(&message) => match enqueued {
                Ok(receipt) => receipt,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to hand message to Kafka producer");
                    return self.record(PublishOutcome::Failed {
                        phase: PublishPhase::Enqueue,
                        reason: e.to_string(),
                        elapsed: started.elapsed(),
                    });
                }
            },
        };

        tracing::info!(topic = %message.topic, bytes = message.payload.len(), "Message sent to Kafka");

        let outcome = tokio::select! {
            biased;
            ack = receipt.acknowledged() => match ack {
                Ok(ack) => {
                    tracing::info!(
                        offset = ack.offset,
                        partition = ack.partition,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Successful to write message"
                    );
                    PublishOutcome::Delivered {
                        partition: ack.partition,
                        offset: ack.offset,
                        elapsed: started.elapsed(),
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to write message");
                    PublishOutcome::Failed {
                        phase: PublishPhase::Acknowledge,
                        reason: e.to_string(),
                        elapsed: started.elapsed(),
                    }
                }
            },
            reason = ctx.cancelled() => {
                tracing::warn!(error = %reason, "Context canceled before success message received");
                PublishOutcome::Cancelled {
                    phase: PublishPhase::Acknowledge,
                    reason,
                    elapsed: started.elapsed(),
                }
            }
        };

        let outcome = self.record(outcome);

        let (flag_ctx, _flag_handle) = CallContext::with_timeout(OVERLOAD_FLAG_TIMEOUT, ctx.trace().clone());
        let extra = int_flag(&flag_ctx, self.flags.as_ref(), KAFKA_QUEUE_PROBLEMS, 0).await;
        if extra > 0 {
            self.simulate_overload(&message, extra).await;
        }

        outcome
    }

    /// Fire-and-forget copies of `message`; the caller does not wait for them
    async fn simulate_overload(&self, message: &OutboundMessage, count: i64) {
        tracing::info!(
            flag = KAFKA_QUEUE_PROBLEMS,
            count = count,
            "Warning: FeatureFlag 'kafkaQueueProblems' is activated, overloading queue now."
        );

        let mut started = 0u64;
        for _ in 0..count {
            let producer = self.producer.clone();
            let message = message.clone();
            let spawned = self
                .overload
                .spawn(async move {
                    match producer.enqueue(&message).await {
                        Ok(receipt) => {
                            if let Err(e) = receipt.acknowledged().await {
                                tracing::debug!(error = %e, "Overload message not acknowledged");
                            }
                        }
                        Err(e) => tracing::debug!(error = %e, "Overload message not enqueued"),
                    }
                })
                .await;

            if !spawned {
                break;
            }
            started += 1;
        }

        self.metrics.overload_messages.inc_by(started);
        tracing::info!(count = started, "Done with #{} messages for overload simulation.", started);
    }

    fn record(&self, outcome: PublishOutcome) -> PublishOutcome {
        let span = tracing::Span::current();
        span.record("messaging.kafka.producer.success", outcome.is_success());
        span.record("messaging.kafka.producer.duration_ms", outcome.elapsed().as_millis() as u64);
        if let Some(offset) = outcome.offset() {
            span.record("messaging.kafka.message.offset", offset);
        }

        self.metrics.record_publish(outcome.label(), outcome.elapsed().as_secs_f64());
        outcome
    }
}
