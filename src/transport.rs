use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::errors::{KafkaRestError, Result};

/// `Content-Type` of consumer control requests (create, subscribe, assign, seek, ...).
pub(crate) const KAFKA_JSON_V2: &str = "application/vnd.kafka.json.v2+json";

/// `Content-Type` of consumer instance deletion.
pub(crate) const KAFKA_V2: &str = "application/vnd.kafka.v2+json";

/// An HTTP request to the REST Proxy, ready to be sent by a [`Transport`].
///
/// Header names are lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestRequest {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RestRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Set a header, replacing any other with the same (case-insensitive) name.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// What a [`Transport`] got back from the REST Proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestResponse {
    pub status: u16,
    pub body: String,
}

impl RestResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(KafkaRestError::Json)
    }
}

/// Sends a [`RestRequest`] and hands back whatever the server answered.
///
/// Implementations must not interpret the response status: that's up to [`RestClient`].
pub trait Transport {
    fn send(&self, request: RestRequest) -> Result<RestResponse>;
}

/// [`Transport`] over HTTP(S), backed by a blocking [`reqwest`] client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport where each request waits at most `timeout`, or forever if `None`.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: RestRequest) -> Result<RestResponse> {
        let mut builder = self.client.request(request.method, request.url.as_str());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;

        Ok(RestResponse { status, body })
    }
}

/// REST Proxy client: prefixes paths with the base URL, adds authentication headers,
/// and turns unsuccessful responses into [`KafkaRestError::Http`].
#[derive(Debug, Clone)]
pub struct RestClient<T = HttpTransport> {
    config: ClientConfig,
    transport: T,
}

impl RestClient<HttpTransport> {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout())?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> RestClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start a request to `path`, relative to the base URL.
    pub fn request(&self, method: Method, path: &str) -> RestRequest {
        RestRequest::new(method, format!("{}{}", self.config.base_url(), path))
    }

    /// Send the request, failing if the response status is not `2xx`.
    ///
    /// Authentication headers take precedence over headers already in the request.
    pub fn execute(&self, mut request: RestRequest) -> Result<RestResponse> {
        for (name, value) in self.config.auth_headers() {
            request.headers.insert(name.clone(), value.clone());
        }

        tracing::debug!(method = %request.method, url = %request.url, "Sending request to REST Proxy");
        let response = self.transport.send(request)?;

        if !response.is_success() {
            return Err(KafkaRestError::Http {
                status: response.status,
                body: response.body,
            });
        }

        Ok(response)
    }
}
