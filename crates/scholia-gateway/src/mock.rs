//! Scripted in-memory transport and JSON fixtures for tests.
//!
//! Replies are consumed in FIFO order, one per request. A request with no
//! scripted reply is rejected, the same way a dropped connection would be.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scholia_core::{AnnotationType, Error, Result};
use serde_json::{Value, json};
use tokio::sync::oneshot;

use crate::{Transport, TransportRequest, TransportResponse};

type Outcome = std::result::Result<TransportResponse, String>;

enum MockReply {
    Ready(Outcome),
    Deferred(oneshot::Receiver<Outcome>),
}

#[derive(Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    requests: Vec<TransportRequest>,
}

/// Transport that answers from a queue of scripted replies.
///
/// Clones share the queue and the request log, so a test can keep one
/// handle while the gateway owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MockTransport")
            .field("pending_replies", &state.replies.len())
            .field("requests", &state.requests.len())
            .finish()
    }
}

impl MockTransport {
    /// Creates a transport with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, reply: MockReply) -> &Self {
        self.lock().replies.push_back(reply);
        self
    }

    /// Queues a response.
    pub fn reply(&self, response: TransportResponse) -> &Self {
        self.push(MockReply::Ready(Ok(response)))
    }

    /// Queues a response with a JSON body.
    pub fn reply_json(&self, status: u16, body: Value) -> &Self {
        self.reply(TransportResponse::json(status, body))
    }

    /// Queues a response without a body.
    pub fn reply_status(&self, status: u16) -> &Self {
        self.reply(TransportResponse::empty(status))
    }

    /// Queues a transport-level rejection.
    pub fn reject(&self, message: impl Into<String>) -> &Self {
        self.push(MockReply::Ready(Err(message.into())))
    }

    /// Queues a reply that is only delivered once the returned handle is
    /// resolved. The request stays in flight until then.
    pub fn defer(&self) -> DeferredReply {
        let (sender, receiver) = oneshot::channel();
        self.push(MockReply::Deferred(receiver));
        DeferredReply { sender }
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.lock().requests.clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Returns the number of replies not consumed yet.
    pub fn pending_replies(&self) -> usize {
        self.lock().replies.len()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let description = format!("{} {}", request.method, request.path);
        let reply = {
            let mut state = self.lock();
            state.requests.push(request);
            state.replies.pop_front()
        };

        let outcome = match reply {
            Some(MockReply::Ready(outcome)) => outcome,
            Some(MockReply::Deferred(receiver)) => receiver
                .await
                .unwrap_or_else(|_| Err(format!("Deferred reply dropped for {description}"))),
            None => Err(format!("No scripted reply for {description}")),
        };

        outcome.map_err(|message| Error::authorization().with_message(message))
    }
}

/// Handle resolving a reply queued with [`MockTransport::defer`].
#[derive(Debug)]
pub struct DeferredReply {
    sender: oneshot::Sender<Outcome>,
}

impl DeferredReply {
    /// Delivers a response.
    pub fn respond(self, response: TransportResponse) {
        let _ = self.sender.send(Ok(response));
    }

    /// Delivers a response with a JSON body.
    pub fn respond_json(self, status: u16, body: Value) {
        self.respond(TransportResponse::json(status, body));
    }

    /// Delivers a transport-level rejection.
    pub fn reject(self, message: impl Into<String>) {
        let _ = self.sender.send(Err(message.into()));
    }
}

/// Starts an annotation entry fixture.
pub fn entry(id: impl Into<String>, thread_id: impl Into<String>) -> EntryFixture {
    EntryFixture {
        id: id.into(),
        thread_id: thread_id.into(),
        thread_number: None,
        annotation_type: AnnotationType::Point,
        message: String::new(),
        page: 1,
        file_version_id: "fv-1".to_owned(),
        author: ("1".to_owned(), "Author".to_owned()),
        created_at: None,
        can_delete: true,
    }
}

/// Builds one page of a listing response.
pub fn page(entries: Vec<Value>, next_marker: Option<&str>) -> Value {
    match next_marker {
        Some(marker) => json!({"entries": entries, "next_marker": marker}),
        None => json!({"entries": entries}),
    }
}

/// Builds an API error object.
pub fn error_object(status: u16, message: &str) -> Value {
    json!({"type": "error", "status": status, "message": message})
}

/// Annotation object as the API would return it.
#[derive(Debug, Clone)]
pub struct EntryFixture {
    id: String,
    thread_id: String,
    thread_number: Option<u32>,
    annotation_type: AnnotationType,
    message: String,
    page: u32,
    file_version_id: String,
    author: (String, String),
    created_at: Option<String>,
    can_delete: bool,
}

impl EntryFixture {
    /// Sets the thread ordinal.
    pub fn with_thread_number(mut self, thread_number: u32) -> Self {
        self.thread_number = Some(thread_number);
        self
    }

    /// Sets the annotation type.
    pub fn with_type(mut self, annotation_type: AnnotationType) -> Self {
        self.annotation_type = annotation_type;
        self
    }

    /// Sets the comment text.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the page in the location.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Sets the file version.
    pub fn with_file_version_id(mut self, file_version_id: impl Into<String>) -> Self {
        self.file_version_id = file_version_id.into();
        self
    }

    /// Sets the author.
    pub fn with_author(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.author = (id.into(), name.into());
        self
    }

    /// Sets the creation time, as an RFC 3339 string.
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    /// Sets whether the caller may delete the annotation.
    pub fn with_can_delete(mut self, can_delete: bool) -> Self {
        self.can_delete = can_delete;
        self
    }

    /// Renders the JSON object.
    pub fn into_json(self) -> Value {
        let mut value = json!({
            "type": "annotation",
            "id": self.id,
            "item": {"type": "file_version", "id": self.file_version_id},
            "details": {
                "type": self.annotation_type.as_ref(),
                "location": {"page": self.page},
                "threadID": self.thread_id,
            },
            "message": self.message,
            "created_by": {"type": "user", "id": self.author.0, "name": self.author.1},
            "permissions": {"can_edit": true, "can_delete": self.can_delete},
        });

        if let Some(thread_number) = self.thread_number {
            value["thread"] = json!(thread_number.to_string());
        }

        if let Some(created_at) = self.created_at {
            value["created_at"] = json!(created_at);
        }

        value
    }
}
