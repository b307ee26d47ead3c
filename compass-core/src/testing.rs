//! Testing utilities for the graph engine.
//!
//! [`MockGenerator`] replays scripted responses in order and records every
//! request it receives, so builders and the audit can be exercised without
//! network access.

use crate::generator::{GenerationRequest, Generator, GeneratorError, RequestKind};
use crate::prompts;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// A scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Return this text.
    Text(String),
    /// Fail with [`GeneratorError::Unavailable`].
    Fail(String),
}

/// What the mock was asked for.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub kind: RequestKind,
    pub chapter: Option<u32>,
    /// The rendered prompt, as a real generator would send it.
    pub prompt: String,
}

/// A generator that returns scripted replies.
///
/// When the script runs out every further call fails.
#[derive(Debug, Default)]
pub struct MockGenerator {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock with replies queued in order.
    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::default(),
        }
    }

    /// Queue a successful reply.
    pub fn push_text(&self, text: impl Into<String>) {
        self.push(MockReply::Text(text.into()));
    }

    /// Queue a failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.push(MockReply::Fail(message.into()));
    }

    pub fn push(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GeneratorError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                kind: request.kind(),
                chapter: request.chapter(),
                prompt: prompts::render(request),
            });

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match reply {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Fail(message)) => Err(GeneratorError::Unavailable(message)),
            None => Err(GeneratorError::Unavailable(
                "mock generator has no more scripted replies".to_string(),
            )),
        }
    }
}
