use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    error::{KafkaError, RDKafkaErrorCode},
    message::{Header, Message, OwnedHeaders},
    producer::{BaseRecord, DeliveryResult, Producer, ProducerContext, ThreadedProducer},
    util::Timeout,
    ClientContext,
};
use std::time::Duration;
use tokio::sync::oneshot;

use super::publisher::{DeliveryAck, DeliveryReceipt, MessageProducer, OutboundMessage, PublishError};

/// Wait between attempts while librdkafka's local queue is full
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(100);

type AckSender = oneshot::Sender<Result<DeliveryAck, PublishError>>;

/// Routes each delivery report to the receipt of the message it belongs to
pub struct AckRouter;

impl ClientContext for AckRouter {}

impl ProducerContext for AckRouter {
    type DeliveryOpaque = Box<AckSender>;

    fn delivery(&self, result: &DeliveryResult<'_>, ack: Self::DeliveryOpaque) {
        let outcome = match result {
            Ok(message) => Ok(DeliveryAck {
                partition: message.partition(),
                offset: message.offset(),
            }),
            Err((e, _)) => Err(PublishError::Broker(e.to_string())),
        };

        // Receiver is gone once the publisher stopped waiting
        let _ = ack.send(outcome);
    }
}

pub struct KafkaProducer {
    producer: ThreadedProducer<AckRouter>,
}

impl KafkaProducer {
    pub fn new(brokers: &str) -> Result<Self, KafkaError> {
        let producer: ThreadedProducer<AckRouter> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create_with_context(AckRouter)?;

        tracing::info!(brokers = %brokers, "Kafka producer created");
        Ok(Self { producer })
    }

    /// Waits up to `timeout` for queued messages to be delivered
    pub fn flush(&self, timeout: Duration) -> Result<(), KafkaError> {
        self.producer.flush(Timeout::After(timeout))
    }
}

#[async_trait]
impl MessageProducer for KafkaProducer {
    async fn enqueue(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, PublishError> {
        let (tx, receipt) = DeliveryReceipt::channel();

        let mut headers = OwnedHeaders::new_with_capacity(message.headers.len());
        for (key, value) in &message.headers {
            headers = headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_bytes()),
            });
        }

        let mut record: BaseRecord<'_, (), Vec<u8>, Box<AckSender>> =
            BaseRecord::with_opaque_to(&message.topic, Box::new(tx))
                .payload(&message.payload)
                .headers(headers);

        loop {
            match self.producer.send(record) {
                Ok(()) => return Ok(receipt),
                Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), returned)) => {
                    tracing::debug!(topic = %message.topic, "Kafka queue full, waiting");
                    record = returned;
                    tokio::time::sleep(QUEUE_FULL_BACKOFF).await;
                }
                Err((e, _)) => return Err(PublishError::Broker(e.to_string())),
            }
        }
    }
}
