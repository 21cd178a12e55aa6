use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::config::{ClientConfig, ConsumerConfig};
use crate::consumer::Consumer;
use crate::errors::{KafkaRestError, Result};
use crate::transport::{RestRequest, RestResponse, Transport};

/// [`Consumer`] of topic `docs`, group `g1`, instance `i1`, talking to `transport`.
pub(crate) fn test_consumer(transport: &MockTransport) -> Consumer<MockTransport> {
    let client_config = ClientConfig::new("http://proxy:8082", "docs").unwrap();
    let config = ConsumerConfig {
        group: "g1".into(),
        instance: "i1".into(),
        ..Default::default()
    };
    Consumer::with_transport(client_config, config, transport.clone())
}

/// In-memory [`Transport`]: records every request, and replies with queued responses in order.
///
/// Clones share the same state, so a test can keep one and hand another to the client.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    state: Rc<RefCell<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    requests: Vec<RestRequest>,
    responses: VecDeque<RestResponse>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, status: u16, body: impl Into<String>) {
        self.state.borrow_mut().responses.push_back(RestResponse {
            status,
            body: body.into(),
        });
    }

    pub(crate) fn push_ok(&self, body: impl Into<String>) {
        self.push(200, body)
    }

    pub(crate) fn push_no_content(&self) {
        self.push(204, "")
    }

    pub(crate) fn requests(&self) -> Vec<RestRequest> {
        self.state.borrow().requests.clone()
    }

    /// `METHOD path` of each request sent so far, base URL stripped.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.state
            .borrow()
            .requests
            .iter()
            .map(|r| {
                let path = r.url.splitn(4, '/').nth(3).unwrap_or_default();
                format!("{} /{}", r.method, path)
            })
            .collect()
    }

    /// Body of the `n`-th request, parsed as JSON.
    pub(crate) fn body_json(&self, n: usize) -> serde_json::Value {
        let requests = self.state.borrow();
        serde_json::from_str(requests.requests[n].body.as_deref().unwrap_or("null")).unwrap()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: RestRequest) -> Result<RestResponse> {
        let mut state = self.state.borrow_mut();
        state.requests.push(request);
        state.responses.pop_front().ok_or_else(|| KafkaRestError::Http {
            status: 599,
            body: "no response queued".into(),
        })
    }
}
