//! Minimal OpenAI-compatible chat completions client.
//!
//! This crate provides a focused client for `/chat/completions` endpoints with:
//! - Non-streaming and streaming completions
//! - Environment-based configuration
//! - Buffered SSE parsing for streaming responses

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio_stream::Stream;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: usize = 8192;
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Errors that can occur when using the chat client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Connection and sampling settings for a [`ChatClient`].
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL of the API, without the `/chat/completions` suffix.
    pub base_url: String,

    /// Bearer token sent with every request.
    pub api_key: String,

    /// Model used when a request does not name one.
    pub model: String,

    /// Sampling temperature used when a request does not set one.
    pub temperature: f32,

    /// Completion token limit used when a request does not set one.
    pub max_tokens: usize,

    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl ChatConfig {
    /// Create a config with default endpoint and sampling settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read the config from `COMPASS_*` environment variables.
    ///
    /// `COMPASS_API_KEY` is required. `COMPASS_BASE_URL`, `COMPASS_MODEL`,
    /// `COMPASS_TEMPERATURE`, `COMPASS_MAX_TOKENS` and `COMPASS_TIMEOUT_SECS`
    /// override the defaults when present.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("COMPASS_API_KEY").map_err(|_| Error::NoApiKey)?;
        let mut config = Self::new(api_key);

        if let Ok(base_url) = std::env::var("COMPASS_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var("COMPASS_MODEL") {
            config.model = model;
        }
        if let Some(temperature) = env_parse("COMPASS_TEMPERATURE")? {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = env_parse("COMPASS_MAX_TOKENS")? {
            config.max_tokens = max_tokens;
        }
        if let Some(timeout_secs) = env_parse("COMPASS_TIMEOUT_SECS")? {
            config.timeout_secs = timeout_secs;
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Full URL of the completions endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Chat completions client.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    config: ChatConfig,
}

impl ChatClient {
    /// Create a new client from a config.
    pub fn new(config: ChatConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Create a client from `COMPASS_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::new(ChatConfig::from_env()?)
    }

    /// The config this client was built with.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Send a completion request and return the full response.
    pub async fn complete(&self, request: Request) -> Result<Response, Error> {
        let response = self.send(&request, false).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        parse_response(api_response)
    }

    /// Send a completion request and stream the response.
    pub async fn stream(
        &self,
        request: Request,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>, Error> {
        let response = self.send(&request, true).await?;

        // Keep raw bytes until a full line arrives so split characters decode intact
        let stream = response
            .bytes_stream()
            .scan(Vec::<u8>::new(), |buffer, result| {
                let events = match result {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);
                        parse_sse_events_buffered(buffer)
                    }
                    Err(e) => vec![Err(Error::Network(e.to_string()))],
                };
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(stream))
    }

    /// Stream a completion and collect the text, calling `on_text` for every delta.
    pub async fn stream_text<F>(&self, request: Request, mut on_text: F) -> Result<String, Error>
    where
        F: FnMut(&str, &str),
    {
        let mut stream = self.stream(request).await?;
        let mut full = String::new();

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::TextDelta { text } => {
                    full.push_str(&text);
                    on_text(&text, &full);
                }
                StreamEvent::Done => break,
                StreamEvent::Finish { .. } => {}
            }
        }

        Ok(full)
    }

    async fn send(&self, request: &Request, stream: bool) -> Result<reqwest::Response, Error> {
        let api_request = self.build_api_request(request, stream);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(self.config.endpoint())
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        Ok(response)
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }

    fn build_api_request(&self, request: &Request, stream: bool) -> ApiRequest {
        ApiRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature.unwrap_or(self.config.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            stream,
        }
    }
}

fn parse_response(api_response: ApiResponse) -> Result<Response, Error> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Parse("response contained no choices".to_string()))?;

    let usage = api_response.usage.unwrap_or_default();

    Ok(Response {
        id: api_response.id,
        model: api_response.model,
        content: choice.message.content.unwrap_or_default(),
        finish_reason: choice
            .finish_reason
            .as_deref()
            .map(FinishReason::from_api)
            .unwrap_or(FinishReason::Stop),
        usage: Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        },
    })
}

// ============================================================================
// Public types
// ============================================================================

/// A completion request.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl Request {
    /// Create a new request with the given messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Single user-message request, the shape every prompt in this workspace uses.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new(vec![Message::user(text)])
    }

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

    pub fn with_system(mut self, text: impl Into<String>) -> Self {
        self.messages.insert(0, Message::system(text));
        self
    }
}

/// A message in the conversation.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// A completion response.
#[derive(Debug, Clone)]
pub struct Response {
    pub id: String,
    pub model: String,
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl Response {
    /// Text of the first choice.
    pub fn text(&self) -> &str {
        &self.content
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    fn from_api(raw: &str) -> Self {
        match raw {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// Events from a streaming response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta { text: String },
    Finish { reason: FinishReason },
    Done,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    max_tokens: usize,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ApiStreamChunk {
    #[serde(default)]
    choices: Vec<ApiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiStreamChoice {
    #[serde(default)]
    delta: ApiStreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Parse SSE events from a buffer, consuming complete lines and leaving partial data.
///
/// Each `data:` line carries one JSON chunk; `[DONE]` ends the stream. Lines that
/// are not data lines (comments, `event:`, blanks) are skipped, and so are data
/// lines that are not valid UTF-8 or JSON.
fn parse_sse_events_buffered(buffer: &mut Vec<u8>) -> Vec<Result<StreamEvent, Error>> {
    let mut events = Vec::new();

    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=newline_pos).collect();
        let line = match String::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Skipping SSE line that is not UTF-8: {e}");
                continue;
            }
        };
        let line = line.trim_end_matches(['\n', '\r']);

        let Some(json_str) = line.strip_prefix("data:").map(str::trim_start) else {
            continue;
        };
        if json_str == "[DONE]" {
            events.push(Ok(StreamEvent::Done));
        } else if !json_str.is_empty() {
            match serde_json::from_str::<ApiStreamChunk>(json_str) {
                Ok(chunk) => events.extend(convert_stream_chunk(chunk).into_iter().map(Ok)),
                Err(e) => tracing::warn!("Skipping unreadable SSE chunk {json_str:?}: {e}"),
            }
        }
    }

    events
}

fn convert_stream_chunk(chunk: ApiStreamChunk) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            events.push(StreamEvent::TextDelta { text });
        }
        if let Some(reason) = choice.finish_reason {
            events.push(StreamEvent::Finish {
                reason: FinishReason::from_api(&reason),
            });
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ChatConfig::new("test-key");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.timeout_secs, 600);
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = ChatConfig::new("k").with_base_url("https://example.test/v1/");
        assert_eq!(config.endpoint(), "https://example.test/v1/chat/completions");
    }

    #[test]
    fn test_client_creation() {
        let config = ChatConfig::new("test-key")
            .with_model("local-model")
            .with_timeout_secs(30);
        let client = ChatClient::new(config).expect("client should build");
        assert_eq!(client.config().model, "local-model");
        assert_eq!(client.config().timeout_secs, 30);
    }

    #[test]
    fn test_request_builder() {
        let request = Request::prompt("Hello")
            .with_system("Only JSON")
            .with_max_tokens(1000)
            .with_temperature(0.2);

        assert_eq!(request.max_tokens, Some(1000));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1].content, "Hello");
    }

    #[test]
    fn test_api_request_falls_back_to_config() {
        let client = ChatClient::new(ChatConfig::new("k").with_temperature(0.3)).unwrap();
        let api = client.build_api_request(&Request::prompt("hi"), false);
        assert_eq!(api.model, DEFAULT_MODEL);
        assert_eq!(api.max_tokens, 8192);
        assert!((api.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(api.messages[0].role, "user");
    }

    #[test]
    fn test_parse_response_first_choice() {
        let raw = r#"{"id":"c1","model":"m","choices":[{"message":{"role":"assistant","content":"{\"a\":1}"},"finish_reason":"length"}],"usage":{"prompt_tokens":3,"completion_tokens":5}}"#;
        let api: ApiResponse = serde_json::from_str(raw).unwrap();
        let response = parse_response(api).unwrap();
        assert_eq!(response.text(), "{\"a\":1}");
        assert_eq!(response.finish_reason, FinishReason::Length);
        assert_eq!(response.usage.completion_tokens, 5);
    }

    #[test]
    fn test_parse_response_without_choices() {
        let api: ApiResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(parse_response(api), Err(Error::Parse(_))));
    }

    #[test]
    fn test_sse_parsing_keeps_partial_line() {
        let mut buffer = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"con".to_vec();
        let events = parse_sse_events_buffered(&mut buffer);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::TextDelta {
                text: "Hel".to_string()
            }
        );
        assert!(buffer.starts_with(b"data: {\"choices\""));

        buffer.extend_from_slice(b"tent\":\"lo\"},\"finish_reason\":\"stop\"}]}\ndata: [DONE]\n");
        let events: Vec<_> = parse_sse_events_buffered(&mut buffer)
            .into_iter()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta {
                    text: "lo".to_string()
                },
                StreamEvent::Finish {
                    reason: FinishReason::Stop
                },
                StreamEvent::Done,
            ]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_sse_skips_non_data_lines() {
        let mut buffer = b": keep-alive\nevent: ping\n\n".to_vec();
        assert!(parse_sse_events_buffered(&mut buffer).is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_sse_character_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"张三\"}}]}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xE5).unwrap() + 1;

        let mut buffer = line[..split].to_vec();
        assert!(parse_sse_events_buffered(&mut buffer).is_empty());

        buffer.extend_from_slice(&line[split..]);
        let events = parse_sse_events_buffered(&mut buffer);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::TextDelta {
                text: "张三".to_string()
            }
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_sse_skips_malformed_data_line() {
        let mut buffer = b"data: {not json\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\ndata: [DONE]\n".to_vec();
        let events: Vec<_> = parse_sse_events_buffered(&mut buffer)
            .into_iter()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta {
                    text: "ok".to_string()
                },
                StreamEvent::Done,
            ]
        );
    }
}
