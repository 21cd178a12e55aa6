use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use serde::Serialize;

use crate::config::{ClientConfig, ProducerConfig};
use crate::errors::{KafkaRestError, Result};
use crate::transport::{HttpTransport, RestClient, Transport};
use crate::utils::{file_mime_type, generate_key};

/// Optional parts of a produce request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProduceOptions {
    /// One key per message. If `None` (or empty), a random key is generated for each message.
    pub keys: Option<Vec<String>>,

    /// Schema of the keys, as understood by the REST Proxy for the configured `Content-Type`.
    pub key_schema: Option<String>,

    /// Schema of the values, as understood by the REST Proxy for the configured `Content-Type`.
    pub value_schema: Option<String>,
}

impl ProduceOptions {
    pub fn with_keys(keys: Vec<String>) -> Self {
        Self {
            keys: Some(keys),
            ..Default::default()
        }
    }
}

#[derive(Serialize)]
struct ProduceRecord<'a, V> {
    key: &'a str,
    value: &'a V,
}

#[derive(Serialize)]
struct ProduceBody<'a, V> {
    records: Vec<ProduceRecord<'a, V>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    key_schema: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    value_schema: Option<&'a str>,
}

/// A file, wrapped so it can travel as a JSON message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMessage {
    /// File name, without its directory.
    pub name: String,

    /// File content, base64 encoded.
    pub bytes: String,

    /// MIME type of the file.
    #[serde(rename = "type")]
    pub mime_type: String,
}

impl FileMessage {
    /// Read the whole file at `path` into a [`FileMessage`].
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read(path).map_err(|source| KafkaRestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            bytes: STANDARD.encode(content),
            mime_type: file_mime_type(path).to_string(),
        })
    }
}

/// Append-only log of the keys used by a [`Producer`].
///
/// The producer itself keeps no history: callers that want one
/// feed it the keys each call to [`Producer::produce`] returns.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyHistory {
    keys: Vec<String>,
    last_request_len: usize,
}

impl KeyHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the keys used by one produce request.
    pub fn record(&mut self, keys: &[String]) {
        self.keys.extend_from_slice(keys);
        self.last_request_len = keys.len();
    }

    /// Keys of the most recently recorded request.
    pub fn last_request(&self) -> &[String] {
        &self.keys[self.keys.len() - self.last_request_len..]
    }

    /// Every key recorded so far, oldest first.
    pub fn all(&self) -> &[String] {
        &self.keys
    }
}

/// Produces batches of messages to a topic, via the REST Proxy.
///
/// Each call to [`Self::produce`] is a single request: the whole batch is either accepted or rejected.
#[derive(Debug, Clone)]
pub struct Producer<T = HttpTransport> {
    rest: RestClient<T>,
    config: ProducerConfig,
}

impl Producer<HttpTransport> {
    pub fn new(client_config: ClientConfig, config: ProducerConfig) -> Result<Self> {
        Ok(Self::with_client(RestClient::new(client_config)?, config))
    }
}

impl<T: Transport> Producer<T> {
    pub fn with_transport(client_config: ClientConfig, config: ProducerConfig, transport: T) -> Self {
        Self::with_client(RestClient::with_transport(client_config, transport), config)
    }

    pub fn with_client(rest: RestClient<T>, config: ProducerConfig) -> Self {
        Self { rest, config }
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    pub fn topic(&self) -> &str {
        self.rest.config().topic()
    }

    /// Produce `messages` to the topic, returning the key used for each, in order.
    ///
    /// Fails without sending anything if `options.keys` doesn't match `messages` in length,
    /// or if the serialized request body exceeds [`ProducerConfig::max_data_bytes`].
    pub fn produce<V: Serialize>(&self, messages: &[V], options: ProduceOptions) -> Result<Vec<String>> {
        let keys = manage_keys(messages.len(), options.keys)?;

        let data = serde_json::to_string(&ProduceBody {
            records: keys
                .iter()
                .zip(messages)
                .map(|(key, value)| ProduceRecord {
                    key: key.as_str(),
                    value,
                })
                .collect(),
            key_schema: options.key_schema.as_deref(),
            value_schema: options.value_schema.as_deref(),
        })?;
        self.check_data_size(&data)?;

        let request = self
            .rest
            .request(Method::POST, &format!("/topics/{}", self.topic()))
            .header("Content-Type", self.config.content_type.as_str())
            .body(data);
        self.rest.execute(request)?;

        tracing::debug!(topic = self.topic(), records = keys.len(), "Produced records");
        Ok(keys)
    }

    /// Produce each file in `paths` as a [`FileMessage`].
    ///
    /// Files are read whole into memory: the size limit applies to the resulting request.
    pub fn produce_files<P: AsRef<Path>>(&self, paths: &[P], keys: Option<Vec<String>>) -> Result<Vec<String>> {
        let messages = paths.iter().map(|p| FileMessage::read(p.as_ref())).collect::<Result<Vec<_>>>()?;

        self.produce(&messages, ProduceOptions {
            keys,
            ..Default::default()
        })
    }

    fn check_data_size(&self, data: &str) -> Result<()> {
        if data.len() > self.config.max_data_bytes {
            return Err(KafkaRestError::PayloadTooLarge {
                size: data.len(),
                max: self.config.max_data_bytes,
            });
        }

        Ok(())
    }
}

fn manage_keys(messages_len: usize, keys: Option<Vec<String>>) -> Result<Vec<String>> {
    match keys {
        Some(keys) if !keys.is_empty() => {
            if keys.len() != messages_len {
                return Err(KafkaRestError::KeysCountMismatch {
                    keys: keys.len(),
                    messages: messages_len,
                });
            }
            Ok(keys)
        },
        _ => Ok((0..messages_len).map(|_| generate_key()).collect()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::io::Write;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::testing::MockTransport;
    use crate::utils::is_thread_safe;

    fn producer(transport: &MockTransport, max_data_bytes: usize) -> Producer<MockTransport> {
        let client_config = ClientConfig::new("http://proxy:8082", "docs").unwrap();
        let config = ProducerConfig {
            max_data_bytes,
            ..Default::default()
        };
        Producer::with_transport(client_config, config, transport.clone())
    }

    #[test]
    fn produce_with_explicit_keys() {
        let transport = MockTransport::new();
        transport.push_ok(r#"{"offsets":[{"partition":0,"offset":0}]}"#);

        let keys = producer(&transport, 1024)
            .produce(&["hello"], ProduceOptions::with_keys(vec!["k1".into()]))
            .unwrap();

        assert_eq!(keys, vec!["k1"]);
        let sent = transport.requests();
        assert_eq!(transport.calls(), vec!["POST /topics/docs"]);
        assert_eq!(sent[0].body.as_deref(), Some(r#"{"records":[{"key":"k1","value":"hello"}]}"#));
        assert_eq!(sent[0].headers["content-type"], "application/vnd.kafka.jsonschema.v2+json");
    }

    #[rstest]
    #[case(None)]
    #[case(Some(vec![]))]
    fn produce_generates_unique_keys(#[case] keys: Option<Vec<String>>) {
        let transport = MockTransport::new();
        transport.push_ok("{}");
        let messages = vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})];

        let keys = producer(&transport, 1024)
            .produce(&messages, ProduceOptions {
                keys,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(keys.len(), messages.len());
        assert_eq!(keys.iter().collect::<HashSet<_>>().len(), messages.len());

        let body = transport.body_json(0);
        for (i, record) in body["records"].as_array().unwrap().iter().enumerate() {
            assert_eq!(record["key"], keys[i].as_str());
            assert_eq!(record["value"], messages[i]);
        }
    }

    #[rstest]
    #[case(vec!["k1"], 2)]
    #[case(vec!["k1", "k2", "k3"], 2)]
    #[case(vec!["k1"], 0)]
    fn keys_count_mismatch_sends_nothing(#[case] keys: Vec<&str>, #[case] messages_len: usize) {
        let transport = MockTransport::new();
        let messages = vec!["m"; messages_len];

        let err = producer(&transport, 1024)
            .produce(&messages, ProduceOptions::with_keys(keys.iter().map(|k| k.to_string()).collect()))
            .unwrap_err();

        assert!(matches!(
            err,
            KafkaRestError::KeysCountMismatch { keys: k, messages: m } if k == keys.len() && m == messages_len
        ));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn oversize_payload_sends_nothing() {
        let transport = MockTransport::new();
        let big = "x".repeat(200);

        let err = producer(&transport, 100).produce(&[big], ProduceOptions::default()).unwrap_err();

        assert!(matches!(err, KafkaRestError::PayloadTooLarge { max: 100, size } if size > 200));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn payload_at_limit_is_accepted() {
        let transport = MockTransport::new();
        transport.push_ok("{}");
        let expected = r#"{"records":[{"key":"k","value":"v"}]}"#;

        producer(&transport, expected.len())
            .produce(&["v"], ProduceOptions::with_keys(vec!["k".into()]))
            .unwrap();

        assert_eq!(transport.requests()[0].body.as_deref(), Some(expected));
    }

    #[test]
    fn schemas_are_included_when_given() {
        let transport = MockTransport::new();
        transport.push_ok("{}");

        producer(&transport, 1024)
            .produce(&[json!({"a": 1})], ProduceOptions {
                keys: Some(vec!["k".into()]),
                key_schema: Some(r#"{"type":"string"}"#.into()),
                value_schema: Some(r#"{"type":"object"}"#.into()),
            })
            .unwrap();

        let body = transport.body_json(0);
        assert_eq!(body["key_schema"], r#"{"type":"string"}"#);
        assert_eq!(body["value_schema"], r#"{"type":"object"}"#);
    }

    #[test]
    fn http_error_is_propagated() {
        let transport = MockTransport::new();
        transport.push(422, r#"{"error_code":42202,"message":"Unprocessable"}"#);

        let err = producer(&transport, 1024).produce(&["v"], ProduceOptions::default()).unwrap_err();
        assert_eq!(err.status(), Some(422));
    }

    #[test]
    fn produce_files_wraps_content() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("report.pdf");
        let bin = dir.path().join("blob.bin");
        fs::File::create(&pdf).unwrap().write_all(b"%PDF-1.4").unwrap();
        fs::File::create(&bin).unwrap().write_all(&[0u8, 1, 2, 255]).unwrap();

        let transport = MockTransport::new();
        transport.push_ok("{}");

        let keys = producer(&transport, 1024).produce_files(&[&pdf, &bin], None).unwrap();
        assert_eq!(keys.len(), 2);

        let body = transport.body_json(0);
        assert_eq!(
            body["records"][0]["value"],
            json!({"name": "report.pdf", "bytes": STANDARD.encode(b"%PDF-1.4"), "type": "application/pdf"})
        );
        assert_eq!(
            body["records"][1]["value"],
            json!({"name": "blob.bin", "bytes": "AAEC/w==", "type": "application/octet-stream"})
        );
    }

    #[test]
    fn produce_files_missing_file_sends_nothing() {
        let transport = MockTransport::new();

        let err = producer(&transport, 1024).produce_files(&["/definitely/not/here.pdf"], None).unwrap_err();

        assert!(matches!(err, KafkaRestError::Io { .. }));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn key_history_is_append_only() {
        let mut history = KeyHistory::new();
        assert!(history.all().is_empty());
        assert!(history.last_request().is_empty());

        history.record(&["a".to_string(), "b".to_string()]);
        history.record(&["c".to_string()]);

        assert_eq!(history.all(), ["a", "b", "c"]);
        assert_eq!(history.last_request(), ["c"]);
    }

    #[test]
    fn test_types_thread_safety() {
        is_thread_safe::<ProduceOptions>();
        is_thread_safe::<FileMessage>();
        is_thread_safe::<KeyHistory>();
        is_thread_safe::<Producer<HttpTransport>>();
    }
}
