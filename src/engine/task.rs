//! One backend call and the candidates it produces.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tracing::{debug, info};

use crate::error::BackendError;
use crate::llm::backend::{GenerationBackend, GenerationRequest};

/// A unit the selection surface can show and, unless it is an error, pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationCandidate {
    /// `BACKEND` or `BACKEND/model`.
    pub source: String,
    /// Display text, prefixed with the source (`[OPENAI] feat: ...`).
    pub label: String,
    /// The full commit message, or the error summary.
    pub text: String,
    pub is_error: bool,
}

impl GenerationCandidate {
    pub fn message(source: &str, text: String) -> Self {
        let first_line = text.lines().next().unwrap_or_default();
        Self {
            source: source.to_string(),
            label: format!("[{}] {}", source, first_line),
            text,
            is_error: false,
        }
    }

    pub fn error(source: &str, err: &BackendError) -> Self {
        let summary = err.summary();
        Self {
            source: source.to_string(),
            label: format!("[{}] {}", source, summary),
            text: summary,
            is_error: true,
        }
    }
}

/// A single backend invocation, bounded by that backend's timeout.
pub struct GenerationTask {
    source: String,
    backend: Arc<dyn GenerationBackend>,
    request: GenerationRequest,
    timeout: Duration,
    limit: usize,
    log_outcome: bool,
}

impl GenerationTask {
    pub fn new(
        source: String,
        backend: Arc<dyn GenerationBackend>,
        request: GenerationRequest,
        limit: usize,
    ) -> Self {
        let settings = &request.config.settings;
        let timeout = settings.timeout;
        let log_outcome = settings.logging;
        Self {
            source,
            backend,
            request,
            timeout,
            limit,
            log_outcome,
        }
    }

    /// `BACKEND`, or `BACKEND/model` for backends with several models.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// Call the backend and map the outcome to candidates.
    ///
    /// Never fails: errors, timeouts and panics inside the backend all
    /// become a single error candidate.
    pub async fn run(self) -> Vec<GenerationCandidate> {
        let started = Instant::now();
        debug!("{} started", self.source);

        let call = tokio::time::timeout(self.timeout, self.backend.generate(&self.request));
        let outcome = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(BackendError::Timeout(self.timeout.as_millis() as u64)),
            Err(payload) => Err(BackendError::Panicked(panic_message(payload))),
        };

        if self.log_outcome {
            match &outcome {
                Ok(messages) => info!(
                    "{} returned {} message(s) in {:.1}s",
                    self.source,
                    messages.len(),
                    started.elapsed().as_secs_f32()
                ),
                Err(e) => info!(
                    "{} failed after {:.1}s: {}",
                    self.source,
                    started.elapsed().as_secs_f32(),
                    e
                ),
            }
        }

        candidates_from(&self.source, outcome, self.limit)
    }
}

/// Successful outcomes yield up to `limit` candidates in backend order;
/// an empty result or an error yields exactly one error candidate.
pub fn candidates_from(
    source: &str,
    outcome: Result<Vec<String>, BackendError>,
    limit: usize,
) -> Vec<GenerationCandidate> {
    match outcome {
        Ok(messages) if !messages.is_empty() => messages
            .into_iter()
            .take(limit)
            .map(|text| GenerationCandidate::message(source, text))
            .collect(),
        Ok(_) => vec![GenerationCandidate::error(
            source,
            &BackendError::InvalidResponse("No commit messages were generated".into()),
        )],
        Err(e) => vec![GenerationCandidate::error(source, &e)],
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
