//! The contract every AI backend implements.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::resolve::BackendConfig;
use crate::error::BackendError;
use crate::llm::prompt::PromptKind;

/// Maximum characters of an error summary shown to the user.
const MAX_SUMMARY_CHARS: usize = 200;

const GENERIC_ERROR: &str = "An error occurred";

/// Input to one backend call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: PromptKind,
    pub system_prompt: Arc<str>,
    pub diff: Arc<str>,
    /// The model this call targets (one of `config.models`).
    pub model: String,
    pub config: BackendConfig,
}

/// One AI backend.
///
/// Returns the generated messages in the backend's own order, or an error
/// exposing a status code where the transport has one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>, BackendError>;
}

impl BackendError {
    /// HTTP status code, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short, human-readable description. Never empty.
    ///
    /// Structured JSON error bodies are mined for their message; otherwise
    /// the first non-empty line is used.
    pub fn summary(&self) -> String {
        let message = match self {
            BackendError::Http { status, body } => {
                let detail = structured_message(body).or_else(|| first_line(body));
                match detail {
                    Some(detail) => format!("{} {}", status, detail),
                    None => format!("{} {}", status, GENERIC_ERROR),
                }
            }
            BackendError::Timeout(ms) => format!("Request timed out after {}ms", ms),
            other => first_line(&other.to_string()).unwrap_or_default(),
        };

        if message.trim().is_empty() {
            return GENERIC_ERROR.to_string();
        }
        truncate(&message, MAX_SUMMARY_CHARS)
    }
}

/// Pull `error.message`, `message`, `detail` or a string `error` out of a JSON body.
fn structured_message(body: &str) -> Option<String> {
    let start = body.find('{')?;
    let value = serde_json::Deserializer::from_str(&body[start..])
        .into_iter::<serde_json::Value>()
        .next()?
        .ok()?;

    ["/error/message", "/message", "/detail", "/error"]
        .iter()
        .filter_map(|pointer| value.pointer(pointer))
        .filter_map(serde_json::Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
