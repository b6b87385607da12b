use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::Settings;

/// Which model family a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    Extraction,
    Report,
    BatchReport,
    LearningSummary,
}

impl RequestKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Report => "report",
            Self::BatchReport => "batch_report",
            Self::LearningSummary => "learning_summary",
        }
    }

    fn needs_vision(self) -> bool {
        matches!(self, Self::Extraction)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ContentPart {
    Text(String),
    ImageDataUrl(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChatRequest {
    pub(crate) kind: RequestKind,
    pub(crate) system: Option<String>,
    pub(crate) user: Vec<ContentPart>,
    pub(crate) max_tokens: u32,
}

impl ChatRequest {
    pub(crate) fn user_text(&self) -> String {
        self.user
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::ImageDataUrl(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ChatCompletion {
    pub(crate) content: String,
    pub(crate) tokens_used: Option<u64>,
}

#[derive(Debug, Error)]
pub(crate) enum GenerationError {
    #[error("generation service unreachable: {0}")]
    Transport(String),
    #[error("generation service error: {0}")]
    Upstream(String),
    #[error("malformed generation response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub(crate) trait GenerationService: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, GenerationError>;
}

/// Chat Completions client for an OpenAI-compatible endpoint.
///
/// Calls are never retried here; an upstream failure belongs to the caller.
#[derive(Debug, Clone)]
pub(crate) struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    vision_model: String,
    text_model: String,
}

impl OpenAiClient {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.ai().request_timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.ai().connect_timeout_seconds))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().openai_api_key.clone(),
            base_url: settings.ai().openai_base_url.trim_end_matches('/').to_string(),
            vision_model: settings.ai().vision_model.clone(),
            text_model: settings.ai().text_model.clone(),
        })
    }

    fn model_for(&self, kind: RequestKind) -> &str {
        if kind.needs_vision() {
            &self.vision_model
        } else {
            &self.text_model
        }
    }
}

#[async_trait]
impl GenerationService for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, GenerationError> {
        let timer = Instant::now();
        let kind = request.kind;
        let model = self.model_for(kind).to_string();
        let payload = build_payload(&model, &request);

        tracing::info!(kind = kind.as_str(), model = %model, max_tokens = request.max_tokens, "Sending generation request");

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                record_outcome(kind, "transport_error", timer);
                GenerationError::Transport(err.to_string())
            })?;

        let status = response.status();
        let raw_body = response.text().await.map_err(|err| {
            record_outcome(kind, "transport_error", timer);
            GenerationError::Transport(err.to_string())
        })?;

        let body: Value = serde_json::from_str(&raw_body).map_err(|err| {
            record_outcome(kind, "malformed", timer);
            GenerationError::MalformedResponse(format!("non-JSON body (status {status}): {err}"))
        })?;

        if !status.is_success() || body.get("error").is_some_and(|value| !value.is_null()) {
            record_outcome(kind, "upstream_error", timer);
            return Err(GenerationError::Upstream(extract_error_message(&body, status.as_u16())));
        }

        let completion = parse_completion(&body).inspect_err(|_| {
            record_outcome(kind, "malformed", timer);
        })?;

        record_outcome(kind, "success", timer);
        tracing::info!(
            kind = kind.as_str(),
            duration_seconds = timer.elapsed().as_secs_f64(),
            tokens_used = completion.tokens_used,
            "Generation request completed"
        );

        Ok(completion)
    }
}

fn record_outcome(kind: RequestKind, status: &'static str, timer: Instant) {
    metrics::counter!(
        "generation_requests_total",
        "kind" => kind.as_str(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!("generation_duration_seconds", "kind" => kind.as_str())
        .record(timer.elapsed().as_secs_f64());
}

pub(crate) fn build_payload(model: &str, request: &ChatRequest) -> Value {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(json!({"role": "system", "content": system}));
    }

    let has_image = request.user.iter().any(|part| matches!(part, ContentPart::ImageDataUrl(_)));
    let user_content = if has_image {
        let parts = request
            .user
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => json!({"type": "text", "text": text}),
                ContentPart::ImageDataUrl(url) => {
                    json!({"type": "image_url", "image_url": {"url": url}})
                }
            })
            .collect::<Vec<_>>();
        Value::Array(parts)
    } else {
        Value::String(request.user_text())
    };
    messages.push(json!({"role": "user", "content": user_content}));

    json!({
        "model": model,
        "messages": messages,
        "max_completion_tokens": request.max_tokens,
    })
}

pub(crate) fn parse_completion(body: &Value) -> Result<ChatCompletion, GenerationError> {
    let content = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            GenerationError::MalformedResponse("missing choices[0].message.content".to_string())
        })?;

    let tokens_used =
        body.get("usage").and_then(|usage| usage.get("total_tokens")).and_then(Value::as_u64);

    Ok(ChatCompletion { content: content.to_string(), tokens_used })
}

fn extract_error_message(payload: &Value, status: u16) -> String {
    if let Some(error) = payload.get("error") {
        if let Some(message) = error.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(text) = error.as_str() {
            return text.to_string();
        }
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("status {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_request() -> ChatRequest {
        ChatRequest {
            kind: RequestKind::Report,
            system: Some("system prompt".to_string()),
            user: vec![ContentPart::Text("Child: Ava".to_string())],
            max_tokens: 4000,
        }
    }

    #[test]
    fn payload_uses_plain_string_for_text_only_requests() {
        let payload = build_payload("gpt-test", &text_request());

        assert_eq!(payload["model"], "gpt-test");
        assert_eq!(payload["max_completion_tokens"], 4000);
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "Child: Ava");
    }

    #[test]
    fn payload_uses_content_parts_when_image_attached() {
        let request = ChatRequest {
            kind: RequestKind::Extraction,
            system: None,
            user: vec![
                ContentPart::Text("Extract".to_string()),
                ContentPart::ImageDataUrl("data:image/png;base64,AAAA".to_string()),
            ],
            max_tokens: 10,
        };
        let payload = build_payload("vision", &request);

        assert_eq!(payload["messages"].as_array().map(Vec::len), Some(1));
        let parts = &payload["messages"][0]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn parse_completion_reads_content_and_usage() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "Report text"}}],
            "usage": {"total_tokens": 321}
        });
        let completion = parse_completion(&body).expect("completion");

        assert_eq!(completion.content, "Report text");
        assert_eq!(completion.tokens_used, Some(321));
    }

    #[test]
    fn parse_completion_without_content_is_malformed() {
        let body = json!({"choices": []});
        assert!(matches!(parse_completion(&body), Err(GenerationError::MalformedResponse(_))));
    }

    #[test]
    fn error_message_prefers_error_object() {
        let body = json!({"error": {"message": "Rate limit reached", "type": "requests"}});
        assert_eq!(extract_error_message(&body, 429), "Rate limit reached");
        assert_eq!(extract_error_message(&json!({}), 500), "status 500");
    }
}
