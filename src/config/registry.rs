//! Static registry of field descriptors per backend.
//!
//! Every backend's table is the composition of the general table, a shared
//! backend base and a backend-specific extension. An extension entry with
//! the same name as a general entry replaces it (OLLAMA's longer timeout).

use std::fmt;
use std::str::FromStr;

use crate::config::fields::{self, FieldValue, Validator};
use crate::config::value::RawValue;
use crate::error::ConfigError;

/// Supported AI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Backend {
    OpenAi,
    Anthropic,
    Gemini,
    Mistral,
    Cohere,
    Groq,
    Ollama,
}

impl Backend {
    pub const ALL: [Backend; 7] = [
        Backend::OpenAi,
        Backend::Anthropic,
        Backend::Gemini,
        Backend::Mistral,
        Backend::Cohere,
        Backend::Groq,
        Backend::Ollama,
    ];

    /// Identifier used as config section name and CLI scope prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::OpenAi => "OPENAI",
            Backend::Anthropic => "ANTHROPIC",
            Backend::Gemini => "GEMINI",
            Backend::Mistral => "MISTRAL",
            Backend::Cohere => "COHERE",
            Backend::Groq => "GROQ",
            Backend::Ollama => "OLLAMA",
        }
    }

    /// Whether the backend runs locally and needs no API key.
    pub fn is_local(&self) -> bool {
        matches!(self, Backend::Ollama)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backend::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown backend: {}", s))
    }
}

/// Shape of a field, used by the store to normalize persisted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Integer,
    Decimal,
    Text,
    List,
}

/// A tagged field descriptor.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub validate: Validator,
}

impl FieldSpec {
    const fn new(name: &'static str, kind: FieldKind, validate: Validator) -> Self {
        Self { name, kind, validate }
    }

    /// Run the validator; `None` yields the default.
    pub fn parse(&self, raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
        (self.validate)(raw)
    }
}

pub const GENERAL_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("locale", FieldKind::Text, fields::locale),
    FieldSpec::new("generate", FieldKind::Integer, fields::generate),
    FieldSpec::new("type", FieldKind::Text, fields::commit_type),
    FieldSpec::new("maxLength", FieldKind::Integer, fields::max_length),
    FieldSpec::new("timeout", FieldKind::Integer, fields::timeout),
    FieldSpec::new("temperature", FieldKind::Decimal, fields::temperature),
    FieldSpec::new("topP", FieldKind::Decimal, fields::top_p),
    FieldSpec::new("maxTokens", FieldKind::Integer, fields::max_tokens),
    FieldSpec::new("logging", FieldKind::Bool, fields::logging),
    FieldSpec::new("includeBody", FieldKind::Bool, fields::include_body),
    FieldSpec::new("exclude", FieldKind::List, fields::exclude),
    FieldSpec::new("codeReview", FieldKind::Bool, fields::code_review),
    FieldSpec::new("systemPrompt", FieldKind::Text, fields::system_prompt),
    FieldSpec::new("systemPromptPath", FieldKind::Text, fields::system_prompt_path),
];

const BACKEND_BASE: &[FieldSpec] = &[FieldSpec::new("disabled", FieldKind::Bool, fields::disabled)];

pub const OPENAI_MODELS: &[&str] = &[
    "gpt-4o-mini",
    "gpt-4o",
    "gpt-4.1",
    "gpt-4.1-mini",
    "gpt-4-turbo",
    "gpt-3.5-turbo",
    "o3-mini",
];

pub const ANTHROPIC_MODELS: &[&str] = &[
    "claude-3-5-haiku-20241022",
    "claude-3-5-sonnet-20241022",
    "claude-3-7-sonnet-20250219",
    "claude-3-opus-20240229",
    "claude-3-haiku-20240307",
];

pub const GEMINI_MODELS: &[&str] = &[
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
];

pub const MISTRAL_MODELS: &[&str] = &[
    "mistral-small-latest",
    "mistral-medium-latest",
    "mistral-large-latest",
    "open-mistral-nemo",
    "codestral-latest",
];

pub const COHERE_MODELS: &[&str] = &[
    "command-r",
    "command-r-plus",
    "command",
    "command-light",
    "command-r7b-12-2024",
];

pub const GROQ_MODELS: &[&str] = &[
    "llama-3.1-8b-instant",
    "llama-3.3-70b-versatile",
    "gemma2-9b-it",
    "mixtral-8x7b-32768",
];

fn openai_model(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::allow_listed("model", raw, OPENAI_MODELS)
}

fn anthropic_model(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::allow_listed("model", raw, ANTHROPIC_MODELS)
}

fn gemini_model(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::allow_listed("model", raw, GEMINI_MODELS)
}

fn mistral_model(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::allow_listed("model", raw, MISTRAL_MODELS)
}

fn cohere_model(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::allow_listed("model", raw, COHERE_MODELS)
}

fn groq_model(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::allow_listed("model", raw, GROQ_MODELS)
}

fn openai_url(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::url("url", raw, "https://api.openai.com")
}

fn anthropic_url(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::url("url", raw, "https://api.anthropic.com")
}

fn gemini_url(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::url("url", raw, "https://generativelanguage.googleapis.com")
}

fn mistral_url(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::url("url", raw, "https://api.mistral.ai")
}

fn cohere_url(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::url("url", raw, "https://api.cohere.com")
}

fn groq_url(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::url("url", raw, "https://api.groq.com/openai")
}

fn ollama_host(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::url("host", raw, "http://localhost:11434")
}

/// Ollama models are free-form names; each one becomes its own task.
fn ollama_model(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::list("model", raw)
}

fn ollama_timeout(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::integer("timeout", raw, 100_000, fields::MIN_TIMEOUT_MS, None)
}

fn ollama_num_ctx(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    fields::integer("numCtx", raw, 2048, 1, None)
}

const KEY: FieldSpec = FieldSpec::new("key", FieldKind::Text, fields::key);

const OPENAI_FIELDS: &[FieldSpec] = &[
    KEY,
    FieldSpec::new("model", FieldKind::Text, openai_model),
    FieldSpec::new("url", FieldKind::Text, openai_url),
];

const ANTHROPIC_FIELDS: &[FieldSpec] = &[
    KEY,
    FieldSpec::new("model", FieldKind::Text, anthropic_model),
    FieldSpec::new("url", FieldKind::Text, anthropic_url),
];

const GEMINI_FIELDS: &[FieldSpec] = &[
    KEY,
    FieldSpec::new("model", FieldKind::Text, gemini_model),
    FieldSpec::new("url", FieldKind::Text, gemini_url),
];

const MISTRAL_FIELDS: &[FieldSpec] = &[
    KEY,
    FieldSpec::new("model", FieldKind::Text, mistral_model),
    FieldSpec::new("url", FieldKind::Text, mistral_url),
];

const COHERE_FIELDS: &[FieldSpec] = &[
    KEY,
    FieldSpec::new("model", FieldKind::Text, cohere_model),
    FieldSpec::new("url", FieldKind::Text, cohere_url),
];

const GROQ_FIELDS: &[FieldSpec] = &[
    KEY,
    FieldSpec::new("model", FieldKind::Text, groq_model),
    FieldSpec::new("url", FieldKind::Text, groq_url),
];

const OLLAMA_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("host", FieldKind::Text, ollama_host),
    FieldSpec::new("model", FieldKind::List, ollama_model),
    FieldSpec::new("numCtx", FieldKind::Integer, ollama_num_ctx),
    FieldSpec::new("timeout", FieldKind::Integer, ollama_timeout),
];

fn extension(backend: Backend) -> &'static [FieldSpec] {
    match backend {
        Backend::OpenAi => OPENAI_FIELDS,
        Backend::Anthropic => ANTHROPIC_FIELDS,
        Backend::Gemini => GEMINI_FIELDS,
        Backend::Mistral => MISTRAL_FIELDS,
        Backend::Cohere => COHERE_FIELDS,
        Backend::Groq => GROQ_FIELDS,
        Backend::Ollama => OLLAMA_FIELDS,
    }
}

/// Ordered field table of a backend: general fields (minus those the
/// extension overrides), the shared base, then the extension.
pub fn backend_fields(backend: Backend) -> Vec<&'static FieldSpec> {
    let ext = extension(backend);
    GENERAL_FIELDS
        .iter()
        .filter(|general| !ext.iter().any(|e| e.name == general.name))
        .chain(BACKEND_BASE.iter())
        .chain(ext.iter())
        .collect()
}

/// Look up a general field by name.
pub fn general_field(name: &str) -> Option<&'static FieldSpec> {
    GENERAL_FIELDS.iter().find(|f| f.name == name)
}

/// Look up a field in a backend's table, extension first.
pub fn backend_field(backend: Backend, name: &str) -> Option<&'static FieldSpec> {
    extension(backend)
        .iter()
        .chain(BACKEND_BASE.iter())
        .chain(GENERAL_FIELDS.iter())
        .find(|f| f.name == name)
}
