//! Concurrent fan-out of one prompt to every enabled backend.
//!
//! Each backend (each model, for OLLAMA) runs as its own task. Candidates
//! are streamed in completion order; a failing backend contributes one
//! error candidate and never affects the others.

pub mod task;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::config::registry::Backend;
use crate::config::resolve::ValidConfig;
use crate::llm::backend::{GenerationBackend, GenerationRequest};
use crate::llm::http::HttpBackend;
use crate::llm::prompt::{MAX_DIFF_SANITIZED_LENGTH, PromptKind, build_system_prompt, sanitize_diff};

pub use task::{GenerationCandidate, GenerationTask, candidates_from};

const CHANNEL_CAPACITY: usize = 32;

/// Creates the client for a backend.
pub trait BackendFactory: Send + Sync {
    fn create(&self, backend: Backend) -> Arc<dyn GenerationBackend>;
}

/// Real HTTP clients sharing one connection pool.
#[derive(Debug, Clone, Default)]
pub struct HttpBackendFactory {
    client: Client,
}

impl HttpBackendFactory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl BackendFactory for HttpBackendFactory {
    fn create(&self, backend: Backend) -> Arc<dyn GenerationBackend> {
        Arc::new(HttpBackend::new(backend, self.client.clone()))
    }
}

/// What the backends are asked about.
#[derive(Debug, Clone)]
pub struct GenerationPrompt {
    pub kind: PromptKind,
    /// Staged diff, sanitized before it is sent.
    pub diff: String,
}

impl GenerationPrompt {
    pub fn commit_message(diff: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::CommitMessage,
            diff: diff.into(),
        }
    }

    pub fn code_review(diff: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::CodeReview,
            diff: diff.into(),
        }
    }
}

pub struct Engine {
    factory: Arc<dyn BackendFactory>,
}

impl Engine {
    pub fn new(factory: impl BackendFactory + 'static) -> Self {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// One task per enabled backend, or per model for multi-model backends.
    ///
    /// Review prompts only go to backends whose `codeReview` is on.
    pub fn plan(&self, config: &ValidConfig, prompt: &GenerationPrompt) -> Vec<GenerationTask> {
        let diff: Arc<str> = sanitize_diff(&prompt.diff, MAX_DIFF_SANITIZED_LENGTH).into();
        let mut tasks = Vec::new();

        for backend_config in config.enabled_backends() {
            if prompt.kind == PromptKind::CodeReview && !backend_config.settings.code_review {
                continue;
            }
            let backend = self.factory.create(backend_config.backend);
            let system_prompt: Arc<str> =
                build_system_prompt(prompt.kind, &backend_config.settings).into();
            let limit = match prompt.kind {
                PromptKind::CommitMessage => backend_config.settings.generate,
                PromptKind::CodeReview => 1,
            };

            for model in &backend_config.models {
                let source = if backend_config.backend.is_local() {
                    format!("{}/{}", backend_config.backend, model)
                } else {
                    backend_config.backend.to_string()
                };
                let request = GenerationRequest {
                    kind: prompt.kind,
                    system_prompt: Arc::clone(&system_prompt),
                    diff: Arc::clone(&diff),
                    model: model.clone(),
                    config: backend_config.clone(),
                };
                tasks.push(GenerationTask::new(
                    source,
                    Arc::clone(&backend),
                    request,
                    limit,
                ));
            }
        }

        tasks
    }

    /// Start every task and return the stream of candidates.
    ///
    /// Must be called from within a Tokio runtime. The stream ends once all
    /// tasks have reported. Cancelling, or dropping the stream, aborts the
    /// tasks still in flight; nothing is emitted after that.
    pub fn generate(&self, config: Arc<ValidConfig>, prompt: GenerationPrompt) -> CandidateStream {
        let tasks = self.plan(&config, &prompt);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        debug!("Dispatching {} generation task(s)", tasks.len());
        tokio::spawn(supervise(tasks, tx, cancel_rx));

        CandidateStream {
            inner: ReceiverStream::new(rx),
            cancel: CancelHandle {
                sender: Arc::new(cancel_tx),
            },
        }
    }
}

async fn supervise(
    tasks: Vec<GenerationTask>,
    tx: mpsc::Sender<GenerationCandidate>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let mut set = JoinSet::new();
    for task in tasks {
        set.spawn(task.run());
    }

    loop {
        tokio::select! {
            biased;

            _ = cancelled(&mut cancel_rx) => {
                debug!("Generation cancelled, aborting {} task(s)", set.len());
                set.abort_all();
                return;
            }
            _ = tx.closed() => {
                set.abort_all();
                return;
            }
            joined = set.join_next() => {
                let Some(joined) = joined else {
                    return;
                };
                // Tasks never panic outward; a JoinError here means it was aborted.
                let Ok(candidates) = joined else {
                    continue;
                };
                for candidate in candidates {
                    // A full channel must not hide a cancel.
                    let sent = tokio::select! {
                        biased;

                        _ = cancelled(&mut cancel_rx) => false,
                        result = tx.send(candidate) => result.is_ok(),
                    };
                    if !sent {
                        set.abort_all();
                        return;
                    }
                }
            }
        }
    }
}

/// Resolves once cancellation is requested or the handle is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|cancelled| *cancelled).await;
}

/// Cancels an in-flight generation. Cloneable, so a signal handler can hold one.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Candidates in completion order.
pub struct CandidateStream {
    inner: ReceiverStream<GenerationCandidate>,
    cancel: CancelHandle,
}

impl CandidateStream {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl Stream for CandidateStream {
    type Item = GenerationCandidate;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        Pin::new(&mut this.inner).poll_next(cx)
    }
}
