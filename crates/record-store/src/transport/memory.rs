//! In-memory transport for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::{Method, Request, Response, Transport};
use crate::{Result, TransportError};

type Handler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;

struct InMemoryTransportState {
    handler: Handler,
    scripted: HashMap<(Method, String), VecDeque<Response>>,
    requests: Vec<Request>,
    fail_next: usize,
    fail_all: bool,
}

impl Default for InMemoryTransportState {
    fn default() -> Self {
        Self {
            handler: Arc::new(echo),
            scripted: HashMap::new(),
            requests: Vec::new(),
            fail_next: 0,
            fail_all: false,
        }
    }
}

/// Default handler: answers 200 with the request body (or `null`).
fn echo(request: &Request) -> Response {
    Response::ok(request.body.clone().unwrap_or(serde_json::Value::Null))
}

/// In-memory transport for testing.
///
/// Responses come from, in order of precedence: the failure switches, a
/// queue of scripted responses for the request's method and path, and the
/// handler. Every request is recorded.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<RwLock<InMemoryTransportState>>,
}

impl InMemoryTransport {
    /// Creates a transport that echoes request bodies back with status 200.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport answering every request with `handler`.
    pub fn with_handler(handler: impl Fn(&Request) -> Response + Send + Sync + 'static) -> Self {
        let transport = Self::new();
        transport.set_handler(handler);
        transport
    }

    /// Replaces the fallback handler.
    pub fn set_handler(&self, handler: impl Fn(&Request) -> Response + Send + Sync + 'static) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).handler = Arc::new(handler);
    }

    /// Queues a one-shot response for the given method and path.
    pub fn respond(&self, method: Method, path: impl Into<String>, response: Response) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .scripted
            .entry((method, path.into()))
            .or_default()
            .push_back(response);
    }

    /// Makes the next request fail without a response.
    pub fn fail_next(&self) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).fail_next += 1;
    }

    /// Makes every request fail until switched off.
    pub fn set_fail_all(&self, fail: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).fail_all = fail;
    }

    /// Returns all requests received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).requests.clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).requests.len()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.requests.push(request.clone());

        if state.fail_all {
            return Err(TransportError::Unavailable("transport offline".to_string()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(TransportError::Unavailable(format!(
                "{} {} dropped",
                request.method, request.path
            )));
        }

        let key = (request.method, request.path.clone());
        if let Some(response) = state.scripted.get_mut(&key).and_then(VecDeque::pop_front) {
            return Ok(response);
        }

        let handler = Arc::clone(&state.handler);
        drop(state);
        Ok(handler(&request))
    }
}
