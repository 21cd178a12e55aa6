use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KafkaRestError {
    #[error("Invalid value assigned to the REST Proxy base URL (or to the 'KAFKA_REST_API_URL' env var)")]
    MissingBaseUrl,

    #[error("Invalid value assigned to the topic (or to the 'TOPIC_ID' env var)")]
    MissingTopic,

    #[error("Invalid value '{value}' in env var '{name}'")]
    InvalidEnvVar { name: &'static str, value: String },

    #[error("List of keys must have the same size as list of messages: {keys} keys for {messages} messages")]
    KeysCountMismatch { keys: usize, messages: usize },

    #[error("Polling interval must be a finite number of seconds greater or equal to 0: got {0}")]
    InvalidPollInterval(f64),

    #[error("Producer request data exceeded allowed number of bytes: {size} > {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("REST Proxy responded with HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failure while talking to the REST Proxy: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failure while (de)serializing JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unable to read file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Topic '{0}' reported no partitions")]
    NoPartitions(String),
}

impl KafkaRestError {
    /// HTTP status of the REST Proxy response, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            KafkaRestError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, KafkaRestError>;
