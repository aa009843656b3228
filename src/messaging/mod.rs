mod kafka;
mod publisher;

pub use kafka::KafkaProducer;
pub use publisher::{
    DeliveryAck, DeliveryReceipt, EventPublisher, MessageProducer, OutboundMessage, PublishError,
};
