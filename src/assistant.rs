use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::config::AssistantConfig;
use crate::errors::AssistantError;
use crate::log_assistant_operation;

const SEMANTIC_SEARCH_PROMPT: &str = "You are a research assistant for ancient Indian scriptures, philosophy, science and literature.

For every question:
1. Draw on the Vedas, Upanishads, Bhagavad Gita, Ramayana, Mahabharata, Arthashastra and related texts
2. Quote relevant passages and name the text they come from
3. Explain the idea plainly and relate it to present-day understanding
4. Treat the spiritual and cultural weight of the material with respect

Sources you may draw on include the four Vedas, the principal Upanishads, the epics, the Arthashastra, \
scientific works such as the Aryabhatiya, Sushruta Samhita and Charaka Samhita, and modern writers such as \
Vivekananda and Tagore.

Answer accurately, with context and references.";

const CHAT_PROMPT: &str = "You are a guide to the Bhartiya Gyan Kosh, a repository of Indian knowledge.

You help people explore:
- Vedic philosophy and cosmology
- Ayurveda and how it relates to modern medicine
- Ancient mathematics and astronomy
- Classical literature and poetry
- Political thought from the Arthashastra
- Spiritual teachings across traditions

Hold a thoughtful conversation, give context, link ancient and modern ideas, and invite the reader to go further.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssistantMode {
    #[default]
    Chat,
    SemanticSearch,
}

impl AssistantMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssistantMode::Chat => "chat",
            AssistantMode::SemanticSearch => "semantic-search",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            AssistantMode::Chat => CHAT_PROMPT,
            AssistantMode::SemanticSearch => SEMANTIC_SEARCH_PROMPT,
        }
    }
}

impl fmt::Display for AssistantMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Body accepted by the assistant endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(rename = "type", default)]
    pub mode: AssistantMode,
}

/// OpenAI-compatible streaming request sent to the gateway
#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    Done,
}

/// Incremental decoder for `data: ` lines of an event stream.
///
/// Bytes are buffered until a full line arrives, so lines and multi-byte
/// characters split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(event) = parse_line(&line[..newline]) {
                events.push(event);
            }
        }
        events
    }

    /// Decode whatever is left once the stream has ended
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest).into_iter().collect()
    }
}

fn parse_line(line: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(line);
    let data = line.trim_end_matches('\r').strip_prefix("data: ")?;
    if data.trim() == "[DONE]" {
        return Some(SseEvent::Done);
    }

    // Keep-alives and partial JSON are skipped
    let chunk: StreamChunk = serde_json::from_str(data).ok()?;
    let content = chunk.choices.into_iter().next()?.delta.content?;
    if content.is_empty() {
        None
    } else {
        Some(SseEvent::Delta(content))
    }
}

/// Shared cancellation flag, checked between decoded events
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Client for the site's assistant endpoint
#[derive(Debug, Clone)]
pub struct AssistantClient {
    client: Client,
    endpoint: String,
}

impl AssistantClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Send `messages` and feed each content fragment to `on_chunk` as it arrives.
    ///
    /// Returns the concatenated reply. Once `cancel` is set no further fragments
    /// are processed and the text gathered so far is returned.
    pub async fn stream_reply<F>(
        &self,
        messages: &[ChatMessage],
        mode: AssistantMode,
        cancel: &CancelFlag,
        mut on_chunk: F,
    ) -> Result<String, AssistantError>
    where
        F: FnMut(&str),
    {
        log_assistant_operation!(start, "stream_reply", mode = mode, message_count = messages.len());
        let started = Instant::now();

        let request = AssistantRequest {
            messages: messages.to_vec(),
            mode,
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error = AssistantError::from_status(status.as_u16());
            log_assistant_operation!(error, "stream_reply", mode = mode, error = error);
            return Err(error);
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut reply = String::new();
        let mut stopped = false;

        while !stopped {
            let Some(chunk) = stream.next().await else {
                break;
            };
            let chunk = chunk?;
            stopped = apply_events(decoder.push(&chunk), cancel, &mut reply, &mut on_chunk);
        }
        if !stopped {
            apply_events(decoder.finish(), cancel, &mut reply, &mut on_chunk);
        }

        if cancel.is_cancelled() {
            log_assistant_operation!(warn, "stream_reply", "cancelled by caller");
        } else {
            log_assistant_operation!(
                success,
                "stream_reply",
                mode = mode,
                duration_ms = started.elapsed().as_millis() as u64,
                chars = reply.chars().count()
            );
        }
        Ok(reply)
    }
}

/// Returns true once the stream should stop being read
fn apply_events<F: FnMut(&str)>(
    events: Vec<SseEvent>,
    cancel: &CancelFlag,
    reply: &mut String,
    on_chunk: &mut F,
) -> bool {
    for event in events {
        if cancel.is_cancelled() {
            return true;
        }
        match event {
            SseEvent::Delta(text) => {
                reply.push_str(&text);
                on_chunk(&text);
            }
            SseEvent::Done => return true,
        }
    }
    cancel.is_cancelled()
}

/// Server side of the assistant endpoint: adds the system prompt and forwards
/// to an OpenAI-compatible gateway with streaming enabled
#[derive(Debug, Clone)]
pub struct AssistantProxy {
    client: Client,
    gateway_url: String,
    api_key: Option<String>,
    model: String,
}

impl AssistantProxy {
    pub fn new(gateway_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            gateway_url: gateway_url.into(),
            api_key,
            model: model.into(),
        }
    }

    pub fn from_config(config: &AssistantConfig) -> Self {
        Self::new(config.gateway_url.clone(), config.api_key.clone(), config.model.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Forward a request; a successful response is returned unread so its body can be streamed on
    pub async fn forward(&self, request: AssistantRequest) -> Result<reqwest::Response, AssistantError> {
        let api_key = self.api_key.as_deref().ok_or(AssistantError::MissingApiKey)?;
        let mode = request.mode;

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage::system(mode.system_prompt()));
        messages.extend(request.messages);

        log_assistant_operation!(start, "forward", mode = mode, message_count = messages.len());

        let body = GatewayRequest {
            model: &self.model,
            messages,
            stream: true,
        };
        let response = self
            .client
            .post(format!("{}/chat/completions", self.gateway_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            let error = AssistantError::from_status(status.as_u16());
            log_assistant_operation!(error, "forward", mode = mode, error = format!("{} ({})", error, error_text));
            return Err(error);
        }

        Ok(response)
    }
}
