//! Common test utilities and helpers for integration tests.

#![allow(dead_code)]
#![allow(clippy::missing_errors_doc)]

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use fallback_provider::{
    FallbackProvider, FallbackProviderBuilder, NetworkIdentity, Transport, TransportError,
};
use mockito::{Matcher, Mock, Server, ServerGuard};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Backoff used by tests that exercise retries; paused time makes it free.
pub const TEST_BACKOFF: Duration = Duration::from_millis(500);

/// Scripted in-memory transport.
///
/// Calls are answered from a queue of scripted results, falling back to a default result once
/// the queue is drained. Clones share state, so a test can keep a handle after passing the
/// transport to the builder.
#[derive(Clone)]
pub struct MockTransport {
    url: String,
    state: Arc<MockState>,
}

struct MockState {
    identity: Mutex<Result<NetworkIdentity, String>>,
    script: Mutex<VecDeque<Result<Value, String>>>,
    fallback: Mutex<Result<Value, String>>,
    delay: Mutex<Option<Duration>>,
    last_request: Mutex<Option<(String, Value)>>,
    calls: AtomicUsize,
    identity_calls: AtomicUsize,
}

impl MockTransport {
    /// Transport on `chain_id` answering every call with `result`.
    pub fn healthy(name: &str, chain_id: u64, result: Value) -> Self {
        Self::new(name, Ok(NetworkIdentity::from_chain_id(chain_id)), Ok(result))
    }

    /// Transport on `chain_id` failing every call.
    pub fn failing(name: &str, chain_id: u64) -> Self {
        Self::new(
            name,
            Ok(NetworkIdentity::from_chain_id(chain_id)),
            Err(format!("{name} is down")),
        )
    }

    /// Transport whose identity query fails.
    pub fn unreachable(name: &str) -> Self {
        Self::new(name, Err(format!("{name} unreachable")), Err(format!("{name} is down")))
    }

    /// Transport reporting `identity` and answering every call with `result`.
    pub fn with_identity(name: &str, identity: NetworkIdentity, result: Value) -> Self {
        Self::new(name, Ok(identity), Ok(result))
    }

    fn new(
        name: &str,
        identity: Result<NetworkIdentity, String>,
        fallback: Result<Value, String>,
    ) -> Self {
        Self {
            url: format!("mock://{name}"),
            state: Arc::new(MockState {
                identity: Mutex::new(identity),
                script: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(fallback),
                delay: Mutex::new(None),
                last_request: Mutex::new(None),
                calls: AtomicUsize::new(0),
                identity_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Queues `count` failures ahead of the default result.
    pub fn fail_next(&self, count: usize) -> &Self {
        let mut script = self.state.script.lock();
        for attempt in 0..count {
            script.push_back(Err(format!("{} scripted failure #{attempt}", self.url)));
        }
        self
    }

    /// Delays every call by `delay` before answering.
    pub fn respond_after(&self, delay: Duration) -> &Self {
        *self.state.delay.lock() = Some(delay);
        self
    }

    /// Replaces the identity reported from now on.
    pub fn set_identity(&self, identity: Result<NetworkIdentity, String>) {
        *self.state.identity.lock() = identity;
    }

    /// Replaces the default call result.
    pub fn set_result(&self, result: Result<Value, String>) {
        *self.state.fallback.lock() = result;
    }

    /// Number of `call`s received.
    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Number of identity queries received.
    pub fn identity_calls(&self) -> usize {
        self.state.identity_calls.load(Ordering::SeqCst)
    }

    /// Method and params of the most recent call.
    pub fn last_request(&self) -> Option<(String, Value)> {
        self.state.last_request.lock().clone()
    }
}

impl Transport for MockTransport {
    fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: &Value) -> Result<Value, TransportError> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        *self.state.last_request.lock() = Some((method.to_owned(), params.clone()));

        let delay = *self.state.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.state.script.lock().pop_front();
        let result = scripted.unwrap_or_else(|| self.state.fallback.lock().clone());
        result.map_err(TransportError::custom)
    }

    async fn network_identity(&self) -> Result<NetworkIdentity, TransportError> {
        self.state.identity_calls.fetch_add(1, Ordering::SeqCst);
        let identity = self.state.identity.lock().clone();
        identity.map_err(TransportError::custom)
    }
}

/// Builder with short, deterministic retry settings.
pub fn test_builder(max_retries: usize) -> FallbackProviderBuilder {
    FallbackProviderBuilder::new()
        .max_retries(max_retries)
        .min_backoff(TEST_BACKOFF)
        .max_backoff(TEST_BACKOFF * 10)
}

/// Provider over `transports` with `max_retries` retries per endpoint.
pub fn setup_mock_provider(
    transports: &[MockTransport],
    max_retries: usize,
) -> anyhow::Result<FallbackProvider<MockTransport>> {
    Ok(test_builder(max_retries).build_with_transports(transports.to_vec())?)
}

/// Mock JSON-RPC node backed by a mockito server.
///
/// Responses echo the request id, as a real node does.
pub struct MockNode {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl MockNode {
    /// Creates a node with no mocked methods.
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    /// Creates a node that reports `chain_id` and `block_number`.
    pub async fn healthy(chain_id: u64, block_number: u64) -> Self {
        let mut node = Self::new().await;
        node.mock_result("eth_chainId", json!(format!("0x{chain_id:x}")))
            .mock_result("eth_blockNumber", json!(format!("0x{block_number:x}")));
        node
    }

    /// Returns the URL of the mock server.
    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Answers `method` with `result`.
    pub fn mock_result(&mut self, method: &str, result: Value) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(method_matcher(method))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |request| {
                let id = request_id(request.body().map(Vec::as_slice).unwrap_or_default());
                json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string().into()
            })
            .create();

        self.mocks.push(mock);
        self
    }

    /// Answers `method` only if the request carries `header` with `value`.
    pub fn mock_result_with_header(
        &mut self,
        method: &str,
        header: &str,
        value: &str,
        result: Value,
    ) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(method_matcher(method))
            .match_header(header, value)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |request| {
                let id = request_id(request.body().map(Vec::as_slice).unwrap_or_default());
                json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string().into()
            })
            .create();

        self.mocks.push(mock);
        self
    }

    /// Fails `method` with an HTTP 500.
    pub fn mock_server_error(&mut self, method: &str) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(method_matcher(method))
            .with_status(500)
            .with_body("internal error")
            .create();

        self.mocks.push(mock);
        self
    }

    /// Answers `method` with a JSON-RPC error object.
    pub fn mock_rpc_error(&mut self, method: &str, code: i64, message: &str) -> &mut Self {
        let message = message.to_owned();
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(method_matcher(method))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |request| {
                let id = request_id(request.body().map(Vec::as_slice).unwrap_or_default());
                json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
                    .to_string()
                    .into()
            })
            .create();

        self.mocks.push(mock);
        self
    }
}

fn method_matcher(method: &str) -> Matcher {
    Matcher::Regex(format!(r#""method"\s*:\s*"{method}""#))
}

fn request_id(body: &[u8]) -> Value {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|request| request.get("id").cloned())
        .unwrap_or(json!(0))
}
