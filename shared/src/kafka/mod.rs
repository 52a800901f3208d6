// Kafka module: rdkafka-backed consumer, producer and the `Transport`
// implementation the transfer worker runs against.

pub mod config;
pub mod consumer;
pub mod producer;
pub mod transport;

// Re-export commonly used types
pub use config::create_client_config;
pub use consumer::MessageConsumer;
pub use producer::MessageProducer;
pub use transport::KafkaTransport;
