//! Scripted generator for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::generate::{GenerationError, GenerationRequest, TextGenerator};

/// Returns queued replies in order and records every request it saw.
/// When the queue is empty the last reply is repeated; with no replies at
/// all, or with failure injection on, every call errors.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    replies: Arc<Mutex<VecDeque<String>>>,
    last: Arc<Mutex<Option<String>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    fail: Arc<AtomicBool>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        let mock = Self::default();
        mock.push_reply(reply);
        mock
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(reply.into());
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TextGenerator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request);
        if self.fail.load(Ordering::SeqCst) {
            return Err(GenerationError::Transport("injected failure".to_string()));
        }
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            *self.last.lock().unwrap() = Some(reply.clone());
            return Ok(reply);
        }
        self.last
            .lock()
            .unwrap()
            .clone()
            .ok_or(GenerationError::EmptyReply)
    }
}
