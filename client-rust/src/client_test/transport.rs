use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use futures::channel::oneshot;
use serde_json::Value;

use crate::{
    errors::{ClientError, ClientResult},
    transport::{HttpRequest, HttpResponse, HttpTransport},
};

/// Result for a mocked request.
/// It can either be a response (of any status) or a failure to reach the
/// server.
pub enum MockReply {
    Response(HttpResponse),
    Error(ClientError),
}

impl MockReply {
    /// A JSON response with the given status.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self::Response(HttpResponse {
            status,
            body: body.to_string().into_bytes(),
        })
    }

    /// A `200 OK` JSON response.
    #[must_use]
    pub fn ok(body: &Value) -> Self {
        Self::json(200, body)
    }

    /// An empty response with the given status.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::Response(HttpResponse {
            status,
            body: Vec::new(),
        })
    }

    /// No response at all.
    #[must_use]
    pub fn network_error(message: &str) -> Self {
        Self::Error(ClientError::Network(message.to_string().into()))
    }

    fn into_result(self) -> ClientResult<HttpResponse> {
        match self {
            Self::Response(response) => Ok(response),
            Self::Error(error) => Err(error),
        }
    }
}

impl From<Value> for MockReply {
    fn from(body: Value) -> Self {
        Self::ok(&body)
    }
}

/// Releases a gated reply. Dropping the gate releases it too.
pub struct MockGate(oneshot::Sender<()>);

impl MockGate {
    pub fn open(self) {
        let _ = self.0.send(());
    }
}

pub type MockHandler = dyn Fn(&HttpRequest) -> MockReply + Send + Sync;

struct QueuedReply {
    reply: MockReply,
    gate: Option<oneshot::Receiver<()>>,
}

#[derive(Default)]
struct MockTransportState {
    replies: VecDeque<QueuedReply>,
    handler: Option<Arc<MockHandler>>,
    tracked_requests: Vec<HttpRequest>,
}

/// A mock transport that tracks requests and yields predefined replies.
///
/// Queued replies are consumed first, in order. Once the queue is empty the
/// handler (if any) answers. A request with neither fails with
/// [`ClientError::Invariant`].
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockTransportState>,
}

impl MockTransport {
    /// Construct a new mock transport instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockTransportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a reply for the next unanswered request.
    pub fn enqueue(&self, reply: impl Into<MockReply>) -> &Self {
        self.state().replies.push_back(QueuedReply {
            reply: reply.into(),
            gate: None,
        });
        self
    }

    /// Enqueue a reply that is only delivered once the returned gate opens.
    /// Used to make an earlier request finish after a later one.
    pub fn enqueue_gated(&self, reply: impl Into<MockReply>) -> MockGate {
        let (sender, receiver) = oneshot::channel();
        self.state().replies.push_back(QueuedReply {
            reply: reply.into(),
            gate: Some(receiver),
        });
        MockGate(sender)
    }

    /// Answer requests computed from the request itself once the queue is
    /// drained.
    pub fn set_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn(&HttpRequest) -> MockReply + Send + Sync + 'static,
    {
        self.state().handler = Some(Arc::new(handler));
        self
    }

    /// Every request sent so far, in send order.
    #[must_use]
    pub fn tracked_requests(&self) -> Vec<HttpRequest> {
        self.state().tracked_requests.clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.state().tracked_requests.len()
    }

    /// Forget tracked requests, keep queued replies and the handler.
    pub fn reset(&self) {
        self.state().tracked_requests.clear();
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        let (reply, gate) = {
            let mut state = self.state();
            state.tracked_requests.push(request.clone());
            if let Some(queued) = state.replies.pop_front() {
                (queued.reply, queued.gate)
            } else if let Some(handler) = state.handler.clone() {
                drop(state);
                (handler(&request), None)
            } else {
                return Err(ClientError::Invariant(format!(
                    "no mocked reply for {} {}",
                    request.method, request.url
                )));
            }
        };

        if let Some(gate) = gate {
            let _ = gate.await;
        }

        reply.into_result()
    }
}
