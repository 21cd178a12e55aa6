use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{KafkaRestError, Result};
use crate::utils::{basic_auth, generate_name};

pub const ENV_BASE_URL: &str = "KAFKA_REST_API_URL";
pub const ENV_TOPIC: &str = "TOPIC_ID";
pub const ENV_API_KEY: &str = "X_API_KEY";
pub const ENV_PRODUCER_DATA_MAX_SIZE: &str = "PRODUCER_DATA_MAX_SIZE";

pub(crate) const API_KEY_HEADER: &str = "x-api-key";

/// Default maximum size of a produce request body: 64 MiB.
pub const DEFAULT_PRODUCER_DATA_MAX_SIZE: usize = 67_108_864;

pub const DEFAULT_PRODUCE_CONTENT_TYPE: &str = "application/vnd.kafka.jsonschema.v2+json";

/// Settings shared by [`Producer`](crate::Producer) and [`Consumer`](crate::Consumer).
///
/// Header names are stored lowercase: HTTP header names are case-insensitive,
/// and this makes a configured header replace any other with the same name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ClientConfigFields")]
pub struct ClientConfig {
    /// Base URL of the REST Proxy, without trailing `/` (ex. `https://proxy.example.com/kafka`).
    pub(crate) base_url: String,

    /// Topic this client produces to or consumes from.
    pub(crate) topic: String,

    pub(crate) auth_headers: BTreeMap<String, String>,

    /// Per-request timeout. When `None`, requests can wait indefinitely.
    pub(crate) timeout: Option<Duration>,
}

/// Unvalidated [`ClientConfig`], as found in a configuration file.
#[derive(Deserialize)]
struct ClientConfigFields {
    base_url: String,
    topic: String,
    #[serde(default)]
    auth_headers: BTreeMap<String, String>,
    #[serde(default)]
    timeout: Option<Duration>,
}

impl TryFrom<ClientConfigFields> for ClientConfig {
    type Error = KafkaRestError;

    fn try_from(fields: ClientConfigFields) -> Result<Self> {
        let mut config = Self::new(fields.base_url, fields.topic)?;
        for (name, value) in fields.auth_headers {
            config = config.with_auth_header(name, value);
        }
        config.timeout = fields.timeout;

        Ok(config)
    }
}

impl ClientConfig {
    /// Create a configuration for the given REST Proxy and topic.
    ///
    /// Both must be non-empty: this is validated here, so that a client can't exist without them.
    pub fn new(base_url: impl Into<String>, topic: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(KafkaRestError::MissingBaseUrl);
        }

        let topic = topic.into();
        if topic.is_empty() {
            return Err(KafkaRestError::MissingTopic);
        }

        Ok(Self {
            base_url,
            topic,
            auth_headers: BTreeMap::new(),
            timeout: None,
        })
    }

    /// Same as [`Self::resolve`], with everything coming from the environment.
    pub fn from_env() -> Result<Self> {
        Self::resolve(None, None)
    }

    /// Create a configuration, falling back to the environment for what is not given.
    ///
    /// * `base_url` - if `None`, read from `KAFKA_REST_API_URL`
    /// * `topic` - if `None`, read from `TOPIC_ID`
    ///
    /// If `X_API_KEY` is set and not empty, it's added as `x-api-key` header.
    pub fn resolve(base_url: Option<String>, topic: Option<String>) -> Result<Self> {
        let base_url = base_url.or_else(|| env::var(ENV_BASE_URL).ok()).unwrap_or_default();
        let topic = topic.or_else(|| env::var(ENV_TOPIC).ok()).unwrap_or_default();

        let mut config = Self::new(base_url, topic)?;
        if let Some(api_key) = env::var(ENV_API_KEY).ok().filter(|k| !k.is_empty()) {
            config = config.with_api_key_if_absent(api_key);
        }

        Ok(config)
    }

    /// Add a header sent with every request.
    pub fn with_auth_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.auth_headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Authenticate with HTTP Basic credentials.
    pub fn with_basic_auth(self, username: &str, password: &str) -> Self {
        self.with_auth_header("Authorization", basic_auth(username, password))
    }

    /// Authenticate with an API key, sent as `x-api-key` header.
    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        self.with_auth_header(API_KEY_HEADER, api_key)
    }

    fn with_api_key_if_absent(self, api_key: String) -> Self {
        if self.auth_headers.contains_key(API_KEY_HEADER) {
            self
        } else {
            self.with_api_key(api_key)
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn auth_headers(&self) -> &BTreeMap<String, String> {
        &self.auth_headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// [`Producer`](crate::Producer) specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// `Content-Type` of produce requests: it tells the REST Proxy how to serialize the records.
    pub content_type: String,

    /// Maximum size (bytes) of each produce request body.
    pub max_data_bytes: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            content_type: DEFAULT_PRODUCE_CONTENT_TYPE.to_string(),
            max_data_bytes: DEFAULT_PRODUCER_DATA_MAX_SIZE,
        }
    }
}

impl ProducerConfig {
    /// Defaults, with `max_data_bytes` read from `PRODUCER_DATA_MAX_SIZE` when set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(value) = env::var(ENV_PRODUCER_DATA_MAX_SIZE) {
            config.max_data_bytes = value.trim().parse().map_err(|_| KafkaRestError::InvalidEnvVar {
                name: ENV_PRODUCER_DATA_MAX_SIZE,
                value,
            })?;
        }

        Ok(config)
    }
}

/// Embedded format of the records read by a consumer instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerFormat {
    #[default]
    Binary,
    Json,
    Avro,
    JsonSchema,
    Protobuf,
}

impl ConsumerFormat {
    /// Value of the `format` field when creating a consumer instance.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerFormat::Binary => "binary",
            ConsumerFormat::Json => "json",
            ConsumerFormat::Avro => "avro",
            ConsumerFormat::JsonSchema => "jsonschema",
            ConsumerFormat::Protobuf => "protobuf",
        }
    }

    /// `Accept` header matching this format, when fetching records.
    pub fn accept(&self) -> &'static str {
        match self {
            ConsumerFormat::Binary => "application/vnd.kafka.binary.v2+json",
            ConsumerFormat::Json => "application/vnd.kafka.json.v2+json",
            ConsumerFormat::Avro => "application/vnd.kafka.avro.v2+json",
            ConsumerFormat::JsonSchema => "application/vnd.kafka.jsonschema.v2+json",
            ConsumerFormat::Protobuf => "application/vnd.kafka.protobuf.v2+json",
        }
    }
}

/// Where a new consumer instance starts reading when its group has no committed offset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

/// [`Consumer`](crate::Consumer) specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Consumer group name. Defaults to a random name.
    pub group: String,

    /// Consumer instance name. Defaults to a random name.
    pub instance: String,

    pub format: ConsumerFormat,

    /// `Accept` header when fetching records: if `None`, [`ConsumerFormat::accept`] is used.
    pub accept: Option<String>,

    /// Maps to `consumer.request.timeout.ms`.
    pub request_timeout_ms: u64,

    /// Maps to `fetch.min.bytes`.
    pub fetch_min_bytes: u64,

    /// Maps to `auto.offset.reset`.
    pub auto_offset_reset: OffsetReset,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: generate_name(),
            instance: generate_name(),
            format: ConsumerFormat::default(),
            accept: None,
            request_timeout_ms: 11_000,
            fetch_min_bytes: 100_000,
            auto_offset_reset: OffsetReset::default(),
        }
    }
}

impl ConsumerConfig {
    pub fn accept(&self) -> &str {
        self.accept.as_deref().unwrap_or_else(|| self.format.accept())
    }
}
