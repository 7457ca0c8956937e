//! HTTP clients for the hosted and local AI backends.
//!
//! Each backend speaks its own wire format; all of them are reduced to the
//! completion text, which [`parse_messages`] turns into commit messages.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use tracing::debug;

use crate::config::registry::Backend;
use crate::error::BackendError;
use crate::llm::backend::{GenerationBackend, GenerationRequest};
use crate::llm::prompt::PromptKind;
use crate::llm::response::parse_messages;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    backend: Backend,
    client: Client,
}

impl HttpBackend {
    pub fn new(backend: Backend, client: Client) -> Self {
        Self { backend, client }
    }

    fn build_request(&self, request: &GenerationRequest) -> RequestBuilder {
        let config = &request.config;
        let settings = &config.settings;
        let base = config.url.as_str();

        match self.backend {
            Backend::OpenAi | Backend::Groq | Backend::Mistral => self
                .client
                .post(format!("{}/v1/chat/completions", base))
                .bearer_auth(&config.key)
                .json(&json!({
                    "model": request.model,
                    "messages": chat_messages(request),
                    "temperature": settings.temperature,
                    "top_p": settings.top_p,
                    "max_tokens": settings.max_tokens,
                })),
            Backend::Anthropic => self
                .client
                .post(format!("{}/v1/messages", base))
                .header("x-api-key", &config.key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": request.model,
                    "system": &*request.system_prompt,
                    "messages": [{ "role": "user", "content": &*request.diff }],
                    "temperature": settings.temperature,
                    "top_p": settings.top_p,
                    "max_tokens": settings.max_tokens,
                })),
            Backend::Gemini => self
                .client
                .post(format!(
                    "{}/v1beta/models/{}:generateContent",
                    base, request.model
                ))
                .query(&[("key", config.key.as_str())])
                .json(&json!({
                    "systemInstruction": { "parts": [{ "text": &*request.system_prompt }] },
                    "contents": [{ "role": "user", "parts": [{ "text": &*request.diff }] }],
                    "generationConfig": {
                        "temperature": settings.temperature,
                        "topP": settings.top_p,
                        "maxOutputTokens": settings.max_tokens,
                    },
                })),
            Backend::Cohere => self
                .client
                .post(format!("{}/v2/chat", base))
                .bearer_auth(&config.key)
                .json(&json!({
                    "model": request.model,
                    "messages": chat_messages(request),
                    "temperature": settings.temperature,
                    "p": settings.top_p,
                    "max_tokens": settings.max_tokens,
                })),
            Backend::Ollama => self.client.post(format!("{}/api/chat", base)).json(&json!({
                "model": request.model,
                "messages": chat_messages(request),
                "stream": false,
                "options": {
                    "temperature": settings.temperature,
                    "top_p": settings.top_p,
                    "num_ctx": config.num_ctx,
                },
            })),
        }
    }

    /// Pull the completion text out of a successful response body.
    fn completion_text(&self, body: &Value) -> Option<String> {
        match self.backend {
            Backend::OpenAi | Backend::Groq | Backend::Mistral => body
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .map(str::to_string),
            Backend::Anthropic => join_text_parts(body.get("content")?),
            Backend::Gemini => join_text_parts(body.pointer("/candidates/0/content/parts")?),
            Backend::Cohere => join_text_parts(body.pointer("/message/content")?),
            Backend::Ollama => body
                .pointer("/message/content")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>, BackendError> {
        debug!("{} request for model {}", self.backend, request.model);

        let response = self.build_request(request).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| BackendError::InvalidResponse(format!("Invalid JSON: {}", e)))?;
        let completion = self
            .completion_text(&body)
            .ok_or_else(|| BackendError::InvalidResponse("No completion text in response".into()))?;

        let settings = &request.config.settings;
        match request.kind {
            PromptKind::CommitMessage => Ok(parse_messages(
                &completion,
                settings.generate,
                settings.include_body,
            )),
            PromptKind::CodeReview => {
                let review = completion.trim();
                Ok(if review.is_empty() {
                    Vec::new()
                } else {
                    vec![review.to_string()]
                })
            }
        }
    }
}

fn chat_messages(request: &GenerationRequest) -> Value {
    json!([
        { "role": "system", "content": &*request.system_prompt },
        { "role": "user", "content": &*request.diff },
    ])
}

/// Concatenate the `text` fields of an array of content parts.
fn join_text_parts(parts: &Value) -> Option<String> {
    let text: String = parts
        .as_array()?
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}
