use std::ops::{Deref, DerefMut};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{ClientConfig, ConsumerConfig};
use crate::errors::Result;
use crate::record::{RawRecord, Record};
use crate::transport::{HttpTransport, KAFKA_JSON_V2, KAFKA_V2, RestClient, Transport};

/// A partition of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

/// First and last offsets of a partition.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionOffsets {
    /// Offset of the earliest record still in the partition.
    #[serde(alias = "beginning_offset")]
    pub start_offset: i64,

    /// Offset the _next_ record will get: one past the last record in the partition.
    ///
    /// If this is `0`, the partition never held any record.
    pub end_offset: i64,
}

/// A partition, as described by the REST Proxy `partitions` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub partition: i32,

    /// Broker ID of the partition leader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader: Option<i32>,

    #[serde(default)]
    pub replicas: Vec<ReplicaInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaInfo {
    pub broker: i32,
    pub leader: bool,
    pub in_sync: bool,
}

/// How a consumer instance is getting its partitions.
///
/// The REST Proxy refuses to mix the two: an instance is either subscribed or assigned.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Subscription {
    #[default]
    None,

    /// Subscribed to the whole topic: partitions are balanced across the consumer group.
    Topic,

    /// Explicitly assigned these partitions, outside of consumer group balancing.
    Partitions(Vec<TopicPartition>),
}

/// A consumer instance on the REST Proxy.
///
/// The instance lives on the server: it's created by [`Self::create`] and stays there,
/// holding resources, until [`Self::delete`] is called. Prefer [`Self::session`]
/// (or [`Self::unsubscribed_session`]), that deletes it even when things go wrong.
///
/// Lifecycle: `create` → `subscribe` or `assign` → consume → `delete`.
#[derive(Debug)]
pub struct Consumer<T = HttpTransport> {
    rest: RestClient<T>,
    config: ConsumerConfig,
    created: bool,
    subscription: Subscription,
}

impl Consumer<HttpTransport> {
    pub fn new(client_config: ClientConfig, config: ConsumerConfig) -> Result<Self> {
        Ok(Self::with_client(RestClient::new(client_config)?, config))
    }
}

impl<T: Transport> Consumer<T> {
    pub fn with_transport(client_config: ClientConfig, config: ConsumerConfig, transport: T) -> Self {
        Self::with_client(RestClient::with_transport(client_config, transport), config)
    }

    pub fn with_client(rest: RestClient<T>, config: ConsumerConfig) -> Self {
        Self {
            rest,
            config,
            created: false,
            subscription: Subscription::None,
        }
    }

    pub fn topic(&self) -> &str {
        self.rest.config().topic()
    }

    pub fn group(&self) -> &str {
        &self.config.group
    }

    pub fn instance(&self) -> &str {
        &self.config.instance
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Has the consumer instance been created on the REST Proxy (and not deleted since)?
    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    fn instance_path(&self) -> String {
        format!("/consumers/{}/instances/{}", self.config.group, self.config.instance)
    }

    /// Create the consumer instance. Does nothing if it's already created.
    pub fn create(&mut self) -> Result<&mut Self> {
        if self.created {
            return Ok(self);
        }

        let body = json!({
            "name": self.config.instance,
            "format": self.config.format.as_str(),
            "auto.offset.reset": self.config.auto_offset_reset.as_str(),
            "consumer.request.timeout.ms": self.config.request_timeout_ms,
            "fetch.min.bytes": self.config.fetch_min_bytes,
        });
        let request = self
            .rest
            .request(Method::POST, &format!("/consumers/{}", self.config.group))
            .header("Content-Type", KAFKA_JSON_V2)
            .body(body.to_string());
        self.rest.execute(request)?;

        self.created = true;
        tracing::info!(group = self.group(), instance = self.instance(), "Created consumer instance");
        Ok(self)
    }

    /// Subscribe the consumer instance to the topic.
    pub fn subscribe(&mut self) -> Result<&mut Self> {
        let body = json!({ "topics": [self.topic()] });
        let request = self
            .rest
            .request(Method::POST, &format!("{}/subscription", self.instance_path()))
            .header("Content-Type", KAFKA_JSON_V2)
            .body(body.to_string());
        self.rest.execute(request)?;

        self.subscription = Subscription::Topic;
        Ok(self)
    }

    /// Assign the given partitions to the consumer instance, bypassing consumer group balancing.
    ///
    /// Unlike [`Self::subscribe`], this gets the partitions immediately: [`Self::seek`] can follow right away.
    pub fn assign(&mut self, partitions: &[TopicPartition]) -> Result<&mut Self> {
        let body = json!({ "partitions": partitions });
        let request = self
            .rest
            .request(Method::POST, &format!("{}/assignments", self.instance_path()))
            .header("Content-Type", KAFKA_JSON_V2)
            .body(body.to_string());
        self.rest.execute(request)?;

        self.subscription = Subscription::Partitions(partitions.to_vec());
        Ok(self)
    }

    /// Delete the consumer instance from the REST Proxy, releasing its resources.
    pub fn delete(&mut self) -> Result<()> {
        let request = self.rest.request(Method::DELETE, &self.instance_path()).header("Content-Type", KAFKA_V2);
        self.rest.execute(request)?;

        self.created = false;
        self.subscription = Subscription::None;
        tracing::info!(group = self.group(), instance = self.instance(), "Deleted consumer instance");
        Ok(())
    }

    /// Create the consumer instance, subscribe it to the topic,
    /// and return a guard that deletes the instance when dropped.
    ///
    /// If subscribing fails, the instance is deleted before returning the error.
    pub fn session(&mut self) -> Result<ConsumerSession<'_, T>> {
        self.create()?;

        if let Err(e) = self.subscribe().map(|_| ()) {
            if let Err(delete_err) = self.delete() {
                tracing::warn!(instance = self.instance(), "Failed to delete consumer instance: {delete_err}");
            }
            return Err(e);
        }

        Ok(ConsumerSession {
            consumer: self,
            closed: false,
        })
    }

    /// Create the consumer instance, without subscribing it,
    /// and return a guard that deletes the instance when dropped.
    ///
    /// Use this for reads that assign partitions themselves, like [`Self::consume_latest`]:
    /// the REST Proxy refuses assignments on a subscribed instance.
    pub fn unsubscribed_session(&mut self) -> Result<ConsumerSession<'_, T>> {
        self.create()?;

        Ok(ConsumerSession {
            consumer: self,
            closed: false,
        })
    }

    /// Partitions of `topic`.
    pub fn partitions(&self, topic: &str) -> Result<Vec<PartitionInfo>> {
        let request = self
            .rest
            .request(Method::GET, &format!("/topics/{topic}/partitions"))
            .header("Content-Type", KAFKA_JSON_V2);

        self.rest.execute(request)?.json()
    }

    /// First and last offsets of `partition` of `topic`.
    pub fn offsets(&self, topic: &str, partition: i32) -> Result<PartitionOffsets> {
        let request = self
            .rest
            .request(Method::GET, &format!("/topics/{topic}/partitions/{partition}/offsets"))
            .header("Content-Type", KAFKA_JSON_V2);

        self.rest.execute(request)?.json()
    }

    /// Move the position of the consumer instance on `partition` of `topic`:
    /// the next fetch will start from `offset`.
    pub fn seek(&self, topic: &str, partition: i32, offset: i64) -> Result<&Self> {
        let body = json!({
            "offsets": [{
                "topic": topic,
                "partition": partition,
                "offset": offset,
            }]
        });
        let request = self
            .rest
            .request(Method::POST, &format!("{}/positions", self.instance_path()))
            .header("Content-Type", KAFKA_JSON_V2)
            .body(body.to_string());
        self.rest.execute(request)?;

        Ok(self)
    }

    /// Fetch the records available from the current position, decoded.
    ///
    /// # Arguments
    ///
    /// * `max_bytes` - Maximum size of the records returned: the REST Proxy default applies if `None`.
    /// * `timeout` - Maximum time (ms) the REST Proxy waits for records: its default applies if `None`.
    pub fn consume_earliest(&self, max_bytes: Option<u64>, timeout: Option<u64>) -> Result<Vec<Record>> {
        let records = self.fetch_records(max_bytes, timeout)?;
        tracing::debug!(instance = self.instance(), records = records.len(), "Fetched records");

        Ok(records.into_iter().map(Record::from).collect())
    }

    /// Same as [`Self::consume_earliest`], but leaving keys and values as the REST Proxy returned them.
    pub fn consume_raw(&self) -> Result<Vec<RawRecord>> {
        self.fetch_records(None, None)
    }

    fn fetch_records(&self, max_bytes: Option<u64>, timeout: Option<u64>) -> Result<Vec<RawRecord>> {
        let mut request = self
            .rest
            .request(Method::GET, &format!("{}/records", self.instance_path()))
            .header("Accept", self.config.accept());
        if let Some(max_bytes) = max_bytes {
            request = request.query("max_bytes", max_bytes);
        }
        if let Some(timeout) = timeout {
            request = request.query("timeout", timeout);
        }

        self.rest.execute(request)?.json()
    }
}

/// A [`Consumer`] instance that exists on the REST Proxy for as long as this guard lives.
///
/// Obtained from [`Consumer::session`] (subscribed to the topic)
/// or [`Consumer::unsubscribed_session`] (left for the caller to assign).
///
/// Dropping the guard deletes the instance from the REST Proxy: failures doing so
/// are only logged. Use [`Self::close`] to handle them.
pub struct ConsumerSession<'a, T: Transport = HttpTransport> {
    consumer: &'a mut Consumer<T>,
    closed: bool,
}

impl<T: Transport> ConsumerSession<'_, T> {
    /// Delete the consumer instance now.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.consumer.delete()
    }
}

impl<T: Transport> Deref for ConsumerSession<'_, T> {
    type Target = Consumer<T>;

    fn deref(&self) -> &Self::Target {
        &*self.consumer
    }
}

impl<T: Transport> DerefMut for ConsumerSession<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.consumer
    }
}

impl<T: Transport> Drop for ConsumerSession<'_, T> {
    fn drop(&mut self) {
        if self.closed || !self.consumer.is_created() {
            return;
        }

        if let Err(e) = self.consumer.delete() {
            tracing::warn!(
                group = self.consumer.group(),
                instance = self.consumer.instance(),
                "Failed to delete consumer instance: {e}"
            );
        }
    }
}
