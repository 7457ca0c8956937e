//! polycommit - generate git commit messages with several AI backends at once.
//!
//! # Overview
//!
//! polycommit reads the staged diff, sends it to every enabled backend
//! concurrently, and streams the resulting candidate messages back as each
//! backend finishes. Configuration is layered: command-line overrides, a
//! persisted TOML document, then built-in defaults, validated field by field.

pub mod commit;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;

// Re-export commonly used types
pub use config::{Backend, BackendConfig, CliOverrides, ConfigStore, ValidConfig, resolve};
pub use engine::{
    BackendFactory, CancelHandle, CandidateStream, Engine, GenerationCandidate, GenerationPrompt,
    HttpBackendFactory,
};
pub use error::{BackendError, CommitError, ConfigError, SelectError};
pub use llm::{GenerationBackend, GenerationRequest};
