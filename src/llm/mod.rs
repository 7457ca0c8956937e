//! AI backend contract, HTTP clients and prompt/response handling.

pub mod backend;
pub mod http;
pub mod prompt;
pub mod response;

pub use backend::{GenerationBackend, GenerationRequest};
pub use http::HttpBackend;
pub use prompt::{PromptKind, build_system_prompt, sanitize_diff};
pub use response::parse_messages;
