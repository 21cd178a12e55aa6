//! A blocking client for the [Kafka REST Proxy] (v2 API).
//!
//! Two entry points:
//!
//! * [`Producer`]: produce batches of messages (or files) to a topic, in a single request each
//! * [`Consumer`]: manage a consumer instance on the REST Proxy, and read records through it
//!
//! Keys and values of consumed records come back as [`DecodedValue`]: the REST Proxy
//! can return plain JSON, base64-wrapped JSON, base64-wrapped bytes or plain text,
//! and [`decode_base64`] recovers the most specific of these.
//!
//! # Example
//!
//! ```no_run
//! use kafka_rest_client::{ClientConfig, Consumer, ConsumerConfig, ProduceOptions, Producer, ProducerConfig};
//!
//! # fn main() -> Result<(), kafka_rest_client::KafkaRestError> {
//! let client_config = ClientConfig::new("http://localhost:8082", "documents")?.with_api_key("secret");
//!
//! let producer = Producer::new(client_config.clone(), ProducerConfig::default())?;
//! let keys = producer.produce(&["hello", "world"], ProduceOptions::default())?;
//!
//! let mut consumer = Consumer::new(client_config, ConsumerConfig::default())?;
//! let session = consumer.session()?;
//! for batch in session.consume(keys, 1.0)? {
//!     let batch = batch?;
//!     println!("{:?} ({} keys to go)", batch.records, batch.remaining.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [Kafka REST Proxy]: https://docs.confluent.io/platform/current/kafka-rest/api.html

mod config;
mod consumer;
mod errors;
mod polling;
mod producer;
mod record;
#[cfg(test)]
mod testing;
mod transport;
mod utils;

pub use config::{
    ClientConfig, ConsumerConfig, ConsumerFormat, DEFAULT_PRODUCE_CONTENT_TYPE, DEFAULT_PRODUCER_DATA_MAX_SIZE,
    ENV_API_KEY, ENV_BASE_URL, ENV_PRODUCER_DATA_MAX_SIZE, ENV_TOPIC, OffsetReset, ProducerConfig,
};
pub use consumer::{
    Consumer, ConsumerSession, PartitionInfo, PartitionOffsets, ReplicaInfo, Subscription, TopicPartition,
};
pub use errors::{KafkaRestError, Result};
pub use polling::{CONSUME_LATEST_ATTEMPTS, KeyedBatch, KeyedPoll};
pub use producer::{FileMessage, KeyHistory, ProduceOptions, Producer};
pub use record::{DecodedValue, RawRecord, Record, decode_base64};
pub use reqwest::Method;
pub use transport::{HttpTransport, RestClient, RestRequest, RestResponse, Transport};
