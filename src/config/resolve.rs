//! Layered configuration resolution.
//!
//! Precedence for a backend field, highest first:
//! 1. `--BACKEND.field=value` on the command line
//! 2. a whole-backend override from the command line (`--disable`, `--only`)
//! 3. an unscoped command-line value
//! 4. the backend's table in the config file
//! 5. the top level of the config file
//! 6. the validator default
//!
//! General fields only consult layers 3, 5 and 6.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::fields::FieldValue;
use crate::config::registry::{Backend, FieldSpec, GENERAL_FIELDS, backend_fields};
use crate::config::value::{RawConfig, RawValue};
use crate::error::ConfigError;

/// Command-line layers, already split by scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    /// Unscoped `--field=value` tokens and structured flags.
    pub general: RawConfig,
    /// `--BACKEND.field=value` tokens.
    pub scoped: BTreeMap<Backend, RawConfig>,
    /// Whole-backend objects set by flags such as `--disable`.
    pub sections: BTreeMap<Backend, RawConfig>,
}

impl CliOverrides {
    pub fn set_general(&mut self, field: &str, value: impl Into<RawValue>) {
        self.general.insert(field.to_string(), value.into());
    }

    pub fn set_scoped(&mut self, backend: Backend, field: &str, value: impl Into<RawValue>) {
        self.scoped
            .entry(backend)
            .or_default()
            .insert(field.to_string(), value.into());
    }

    pub fn set_section(&mut self, backend: Backend, section: RawConfig) {
        self.sections.insert(backend, section);
    }
}

/// Commit message style selected by the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStyle {
    Conventional,
    Gitmoji,
    /// Plain message without a type prefix.
    Untyped,
}

impl CommitStyle {
    fn from_field(value: &str) -> Self {
        match value {
            "conventional" => CommitStyle::Conventional,
            "gitmoji" => CommitStyle::Gitmoji,
            _ => CommitStyle::Untyped,
        }
    }
}

/// Validated generation settings, shared by the general section and every backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub locale: String,
    pub generate: usize,
    pub commit_style: CommitStyle,
    pub max_length: usize,
    pub timeout: Duration,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub logging: bool,
    pub include_body: bool,
    pub exclude: Vec<String>,
    pub code_review: bool,
    pub system_prompt: String,
    pub system_prompt_path: String,
}

/// Validated configuration of one backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub backend: Backend,
    pub settings: GenerationSettings,
    /// API key; always empty for local backends.
    pub key: String,
    /// Selected models. A single entry for hosted backends.
    pub models: Vec<String>,
    /// Base URL (`host` for OLLAMA).
    pub url: String,
    pub disabled: bool,
    /// OLLAMA context window.
    pub num_ctx: Option<u64>,
}

impl BackendConfig {
    /// Whether enough is configured to attempt a call.
    pub fn is_configured(&self) -> bool {
        if self.backend.is_local() {
            !self.models.is_empty()
        } else {
            !self.key.is_empty()
        }
    }

    /// Enabled means configured and not disabled.
    pub fn is_enabled(&self) -> bool {
        !self.disabled && self.is_configured()
    }
}

/// The fully resolved configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidConfig {
    pub general: GenerationSettings,
    pub backends: BTreeMap<Backend, BackendConfig>,
}

impl ValidConfig {
    pub fn backend(&self, backend: Backend) -> Option<&BackendConfig> {
        self.backends.get(&backend)
    }

    /// Backends that will receive a generation task, in registry order.
    pub fn enabled_backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.values().filter(|b| b.is_enabled())
    }
}

/// Merge every layer and validate each field.
///
/// Stops at the first invalid field. Backend field errors are reported as
/// `BACKEND.field`.
pub fn resolve(cli: &CliOverrides, persisted: &RawConfig) -> Result<ValidConfig, ConfigError> {
    let mut general = FieldMap::default();
    for spec in GENERAL_FIELDS {
        let raw = cli
            .general
            .get(spec.name)
            .or_else(|| persisted_general(persisted, spec.name));
        general.insert(spec, raw)?;
    }

    let mut backends = BTreeMap::new();
    for backend in Backend::ALL {
        let persisted_section = persisted
            .get(backend.as_str())
            .and_then(RawValue::as_section);
        let cli_scoped = cli.scoped.get(&backend);
        let cli_section = cli.sections.get(&backend);

        let mut values = FieldMap::default();
        for spec in backend_fields(backend) {
            let raw = cli_scoped
                .and_then(|s| s.get(spec.name))
                .or_else(|| cli_section.and_then(|s| s.get(spec.name)))
                .or_else(|| cli.general.get(spec.name))
                .or_else(|| persisted_section.and_then(|s| s.get(spec.name)))
                .or_else(|| persisted_general(persisted, spec.name));

            values
                .insert(spec, raw)
                .map_err(|e| scope_error(backend, e))?;
        }

        let config = values
            .backend_config(backend)
            .map_err(|e| scope_error(backend, e))?;
        backends.insert(backend, config);
    }

    Ok(ValidConfig {
        general: general.settings()?,
        backends,
    })
}

/// Top-level persisted value, ignoring backend sections.
fn persisted_general<'a>(persisted: &'a RawConfig, name: &str) -> Option<&'a RawValue> {
    persisted.get(name).filter(|v| v.as_section().is_none())
}

fn scope_error(backend: Backend, err: ConfigError) -> ConfigError {
    match err {
        ConfigError::Invalid { field, reason } => ConfigError::Invalid {
            field: format!("{}.{}", backend, field),
            reason,
        },
        other => other,
    }
}

/// Validated values by field name, with typed accessors.
#[derive(Debug, Default)]
struct FieldMap(BTreeMap<&'static str, FieldValue>);

impl FieldMap {
    fn insert(&mut self, spec: &FieldSpec, raw: Option<&RawValue>) -> Result<(), ConfigError> {
        let value = spec.parse(raw)?;
        self.0.insert(spec.name, value);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<&FieldValue, ConfigError> {
        self.0
            .get(name)
            .ok_or_else(|| ConfigError::invalid(name, "Missing from field table"))
    }

    fn bool(&self, name: &str) -> Result<bool, ConfigError> {
        self.get(name)?.as_bool().ok_or_else(|| mismatch(name))
    }

    fn integer(&self, name: &str) -> Result<u64, ConfigError> {
        self.get(name)?.as_integer().ok_or_else(|| mismatch(name))
    }

    fn decimal(&self, name: &str) -> Result<f64, ConfigError> {
        self.get(name)?.as_decimal().ok_or_else(|| mismatch(name))
    }

    fn text(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name)?
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| mismatch(name))
    }

    fn list(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        self.get(name)?
            .as_list()
            .map(<[String]>::to_vec)
            .ok_or_else(|| mismatch(name))
    }

    fn settings(&self) -> Result<GenerationSettings, ConfigError> {
        Ok(GenerationSettings {
            locale: self.text("locale")?,
            generate: self.integer("generate")? as usize,
            commit_style: CommitStyle::from_field(&self.text("type")?),
            max_length: self.integer("maxLength")? as usize,
            timeout: Duration::from_millis(self.integer("timeout")?),
            temperature: self.decimal("temperature")?,
            top_p: self.decimal("topP")?,
            max_tokens: u32::try_from(self.integer("maxTokens")?)
                .map_err(|_| ConfigError::invalid("maxTokens", "Must fit in 32 bits"))?,
            logging: self.bool("logging")?,
            include_body: self.bool("includeBody")?,
            exclude: self.list("exclude")?,
            code_review: self.bool("codeReview")?,
            system_prompt: self.text("systemPrompt")?,
            system_prompt_path: self.text("systemPromptPath")?,
        })
    }

    fn backend_config(&self, backend: Backend) -> Result<BackendConfig, ConfigError> {
        let (key, models, url, num_ctx) = if backend.is_local() {
            (
                String::new(),
                self.list("model")?,
                self.text("host")?,
                Some(self.integer("numCtx")?),
            )
        } else {
            (
                self.text("key")?,
                vec![self.text("model")?],
                self.text("url")?,
                None,
            )
        };

        Ok(BackendConfig {
            backend,
            settings: self.settings()?,
            key,
            models,
            url,
            disabled: self.bool("disabled")?,
            num_ctx,
        })
    }
}

fn mismatch(name: &str) -> ConfigError {
    ConfigError::invalid(name, "Validator produced an unexpected type")
}
