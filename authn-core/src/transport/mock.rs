//! Scripted mock transport for tests and examples.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{Operation, Transport, TransportReply};
use crate::error::{AuthnError, Result};

/// One submission the mock has seen.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: Operation,
    pub payload: Option<Value>,
}

/// Replays scripted replies in FIFO order and records every submission,
/// so tests can assert both what was sent and that nothing was sent.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<TransportReply>>,
    calls: Mutex<Vec<RecordedCall>>,
    submissions: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply; replies are consumed in the order they were queued.
    pub fn enqueue(&self, reply: TransportReply) {
        self.replies
            .lock()
            .expect("mock transport lock poisoned")
            .push_back(reply);
    }

    pub fn enqueue_ok(&self, body: Value) {
        self.enqueue(TransportReply::ok(body));
    }

    pub fn enqueue_status(&self, status: u16, body: Value) {
        self.enqueue(TransportReply::new(status, body));
    }

    /// Number of submissions seen so far.
    pub fn call_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Everything submitted so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .expect("mock transport lock poisoned")
            .clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn submit(
        &self,
        operation: &Operation,
        payload: Option<&Value>,
    ) -> Result<TransportReply> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .expect("mock transport lock poisoned")
            .push(RecordedCall {
                operation: operation.clone(),
                payload: payload.cloned(),
            });

        self.replies
            .lock()
            .expect("mock transport lock poisoned")
            .pop_front()
            .ok_or_else(|| AuthnError::Transport("mock transport has no scripted reply".to_string()))
    }
}
