//! The seam between the engine and whatever produces graph text.
//!
//! Builders and the audit never talk to a model directly. They describe what
//! they need as a [`GenerationRequest`] and get raw text back from a
//! [`Generator`]. [`ChatGenerator`] is the production implementation;
//! [`crate::testing::MockGenerator`] scripts responses for tests.

use crate::graph::Snapshot;
use crate::project::NarrativeMaterial;
use crate::prompts;
use async_trait::async_trait;
use chat::{ChatClient, FinishReason, Request};
use thiserror::Error;

/// Errors from producing generator text.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("chat error: {0}")]
    Chat(#[from] chat::Error),

    #[error("generator unavailable: {0}")]
    Unavailable(String),
}

/// Which of the four bundles a request is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Baseline,
    ChapterDelta,
    Audit,
    ChapterGraph,
}

impl RequestKind {
    /// Get the display name for this request kind.
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::Baseline => "baseline",
            RequestKind::ChapterDelta => "chapter delta",
            RequestKind::Audit => "audit",
            RequestKind::ChapterGraph => "chapter graph",
        }
    }
}

/// Everything the generator needs for one call.
#[derive(Debug, Clone, Copy)]
pub enum GenerationRequest<'a> {
    /// Build the chapter 0 graph from the project's setting documents.
    Baseline(&'a NarrativeMaterial),

    /// Describe how `reference` changes over one chapter.
    ChapterDelta {
        chapter: u32,
        chapter_text: &'a str,
        reference: &'a Snapshot,
    },

    /// Look for contradictions across the rendered snapshot sequence.
    Audit {
        chapter_outline: Option<&'a str>,
        snapshots_text: &'a str,
    },

    /// Extract a standalone graph from a single chapter.
    ChapterGraph {
        chapter: u32,
        chapter_text: &'a str,
        character_state: Option<&'a str>,
    },
}

impl GenerationRequest<'_> {
    pub fn kind(&self) -> RequestKind {
        match self {
            GenerationRequest::Baseline(_) => RequestKind::Baseline,
            GenerationRequest::ChapterDelta { .. } => RequestKind::ChapterDelta,
            GenerationRequest::Audit { .. } => RequestKind::Audit,
            GenerationRequest::ChapterGraph { .. } => RequestKind::ChapterGraph,
        }
    }

    /// Chapter the request is about, if any.
    pub fn chapter(&self) -> Option<u32> {
        match self {
            GenerationRequest::ChapterDelta { chapter, .. }
            | GenerationRequest::ChapterGraph { chapter, .. } => Some(*chapter),
            GenerationRequest::Baseline(_) | GenerationRequest::Audit { .. } => None,
        }
    }
}

/// Produces raw response text for a request.
///
/// Implementations return whatever the model said; normalization happens in
/// the caller.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GeneratorError>;
}

/// Configuration for [`ChatGenerator`]. Unset fields fall back to the client's config.
#[derive(Debug, Clone, Default)]
pub struct GenerationConfig {
    pub model: Option<String>,

    pub max_tokens: Option<usize>,

    pub temperature: Option<f32>,

    /// Use the streaming endpoint and log progress as text arrives.
    pub stream: bool,
}

impl GenerationConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// A [`Generator`] backed by an OpenAI-compatible chat completions endpoint.
pub struct ChatGenerator {
    client: ChatClient,
    config: GenerationConfig,
}

impl ChatGenerator {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            config: GenerationConfig::default(),
        }
    }

    /// Create from `COMPASS_*` environment variables.
    pub fn from_env() -> Result<Self, GeneratorError> {
        Ok(Self::new(ChatClient::from_env()?))
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn build_request(&self, prompt: String) -> Request {
        let mut request = Request::prompt(prompt);
        if let Some(model) = &self.config.model {
            request = request.with_model(model);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GeneratorError> {
        let kind = request.kind();
        let chat_request = self.build_request(prompts::render(request));

        tracing::debug!(kind = kind.name(), chapter = ?request.chapter(), "Requesting generation");

        if self.config.stream {
            let text = self
                .client
                .stream_text(chat_request, |_, full| {
                    tracing::trace!(kind = kind.name(), received = full.len(), "Streaming");
                })
                .await?;
            return Ok(text);
        }

        let response = self.client.complete(chat_request).await?;
        if response.finish_reason == FinishReason::Length {
            tracing::warn!(
                kind = kind.name(),
                completion_tokens = response.usage.completion_tokens,
                "Generation hit the token limit; JSON is likely truncated"
            );
        }
        Ok(response.text().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use chat::ChatConfig;

    #[test]
    fn test_request_kind_and_chapter() {
        let material = NarrativeMaterial::default();
        let snapshot = Snapshot::from_parts(vec![Node::character("a", "Ann")], Vec::new());

        let baseline = GenerationRequest::Baseline(&material);
        assert_eq!(baseline.kind(), RequestKind::Baseline);
        assert_eq!(baseline.chapter(), None);

        let delta = GenerationRequest::ChapterDelta {
            chapter: 4,
            chapter_text: "text",
            reference: &snapshot,
        };
        assert_eq!(delta.kind(), RequestKind::ChapterDelta);
        assert_eq!(delta.chapter(), Some(4));
    }

    #[test]
    fn test_build_request_applies_overrides() {
        let client = ChatClient::new(ChatConfig::new("test-key")).unwrap();
        let generator = ChatGenerator::new(client).with_config(
            GenerationConfig::default()
                .with_model("local-model")
                .with_max_tokens(1024),
        );

        let request = generator.build_request("hello".to_string());
        assert_eq!(request.model.as_deref(), Some("local-model"));
        assert_eq!(request.max_tokens, Some(1024));
        assert_eq!(request.temperature, None);
        assert_eq!(request.messages.len(), 1);
    }
}
