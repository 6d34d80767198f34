//! OpenAI-compatible LLM adapter.
//!
//! Works with the Hugging Face router, DeepSeek, OpenAI, and any provider
//! using the OpenAI chat completions API format.
//! Failures are classified into `UpstreamKind` so the retry executor can
//! tell overload from a bad request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use chat_core::ports::*;
use chat_types::{
    config::LlmConfig,
    message::{ContentPart, Message, MessageContent},
    ChatError, Result, UpstreamKind,
};

/// Longest slice of a provider error body kept in the error message.
const MAX_ERROR_BODY: usize = 500;

/// Provider that speaks the OpenAI chat completions protocol.
pub struct OpenAiCompatProvider {
    config: LlmConfig,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let base_url = config
            .api_base
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            return Err(ChatError::Config(format!(
                "llm.api_base is required for the {} provider",
                config.provider.label()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request_body(&self, req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req.messages().iter().map(message_to_json).collect();

        json!({
            "model": req.model,
            "messages": messages,
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
        })
    }
}

#[async_trait]
impl CompletionPort for OpenAiCompatProvider {
    async fn complete(&self, req: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(&req);

        let mut request = self.client.post(&url).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            let kind = classify_status(status, &text);
            log::debug!("{} returned HTTP {} ({})", self.provider_name(), status.as_u16(), kind);
            return Err(ChatError::upstream(
                kind,
                format!("HTTP {}: {}", status.as_u16(), truncate(&text, MAX_ERROR_BODY)),
            ));
        }

        let data: ApiResponse = response.json().await.map_err(|e| {
            ChatError::upstream(UpstreamKind::Unknown, format!("invalid response body: {}", e))
        })?;

        let choice = data.choices.into_iter().next().ok_or_else(|| {
            ChatError::upstream(UpstreamKind::Unknown, "No choices in response")
        })?;

        let usage = data.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ChatResponse {
            text: choice.message.content.unwrap_or_default(),
            usage,
        })
    }

    fn provider_name(&self) -> &str {
        self.config.provider.label()
    }
}

/// Map a non-2xx provider response to an upstream kind.
pub fn classify_status(status: StatusCode, body: &str) -> UpstreamKind {
    if body.to_ascii_lowercase().contains("overloaded") {
        return UpstreamKind::Overloaded;
    }
    match status.as_u16() {
        429 => UpstreamKind::RateLimited,
        408 => UpstreamKind::Timeout,
        500 | 502 | 503 | 504 | 529 => UpstreamKind::Overloaded,
        400 | 401 | 403 | 404 | 413 | 422 => UpstreamKind::InvalidRequest,
        _ => UpstreamKind::Unknown,
    }
}

fn transport_error(e: reqwest::Error) -> ChatError {
    let kind = if e.is_timeout() {
        UpstreamKind::Timeout
    } else {
        UpstreamKind::Unknown
    };
    ChatError::upstream(kind, e.to_string())
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ─── API response types ──────────────────────────────────────

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// ─── Serialization helpers ───────────────────────────────────

fn message_to_json(msg: &Message) -> Value {
    let content = match &msg.content {
        MessageContent::Text(text) => json!(text),
        MessageContent::Parts(parts) => {
            let parts: Vec<Value> = parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                    ContentPart::ImageUrl { image_url } => json!({
                        "type": "image_url",
                        "image_url": { "url": image_url.url },
                    }),
                })
                .collect();
            json!(parts)
        }
    };

    json!({
        "role": msg.role.as_str(),
        "content": content,
    })
}
