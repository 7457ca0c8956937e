//! Field validators: one pure parsing function per configuration field.
//!
//! A validator receives `None` when no layer supplied a value and must then
//! produce the field's default. Any other input is parsed into a typed
//! [`FieldValue`] or rejected with [`ConfigError::Invalid`] naming the field
//! and the violated rule.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::config::value::RawValue;
use crate::error::ConfigError;

/// Signature shared by every validator in the registry.
pub type Validator = fn(Option<&RawValue>) -> Result<FieldValue, ConfigError>;

static INTEGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("Invalid regex"));
static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d{1,2})?$").expect("Invalid regex"));
static LOCALE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w-]+$").expect("Invalid regex"));

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const MIN_TIMEOUT_MS: u64 = 500;
pub const MAX_GENERATE: u64 = 5;
pub const MIN_MAX_LENGTH: u64 = 20;

/// Commit message styles accepted by the `type` field.
pub const COMMIT_TYPES: &[&str] = &["conventional", "gitmoji", ""];

/// A validated field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Integer(u64),
    Decimal(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<u64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            FieldValue::Decimal(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert back into the raw shape, e.g. to feed a validator again.
    pub fn to_raw(&self) -> RawValue {
        match self {
            FieldValue::Bool(b) => RawValue::Bool(*b),
            FieldValue::Integer(n) => RawValue::Str(n.to_string()),
            FieldValue::Decimal(n) => RawValue::Str(n.to_string()),
            FieldValue::Text(s) => RawValue::Str(s.clone()),
            FieldValue::List(items) => RawValue::List(items.clone()),
        }
    }
}

/// Extract a trimmed scalar string. Empty strings count as absent.
fn scalar(field: &str, raw: Option<&RawValue>) -> Result<Option<String>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(RawValue::Str(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(RawValue::Bool(b)) => Ok(Some(b.to_string())),
        Some(RawValue::List(_)) => Err(ConfigError::invalid(field, "Must be a single value")),
        Some(RawValue::Section(_)) => Err(ConfigError::invalid(field, "Must be a single value")),
    }
}

/// Parse an integer string with inclusive bounds.
pub fn integer(
    field: &str,
    raw: Option<&RawValue>,
    default: u64,
    min: u64,
    max: Option<u64>,
) -> Result<FieldValue, ConfigError> {
    let Some(text) = scalar(field, raw)? else {
        return Ok(FieldValue::Integer(default));
    };

    if !INTEGER_RE.is_match(&text) {
        return Err(ConfigError::invalid(field, "Must be an integer"));
    }
    let value: u64 = text
        .parse()
        .map_err(|_| ConfigError::invalid(field, "Must be an integer"))?;

    if value < min {
        return Err(ConfigError::invalid(
            field,
            format!("Must be greater than or equal to {min}"),
        ));
    }
    if let Some(max) = max
        && value > max
    {
        return Err(ConfigError::invalid(
            field,
            format!("Must be less than or equal to {max}"),
        ));
    }

    Ok(FieldValue::Integer(value))
}

/// Parse a decimal string in `(0, max]` with at most two fraction digits.
pub fn decimal(
    field: &str,
    raw: Option<&RawValue>,
    default: f64,
    max: f64,
) -> Result<FieldValue, ConfigError> {
    let Some(text) = scalar(field, raw)? else {
        return Ok(FieldValue::Decimal(default));
    };

    if !DECIMAL_RE.is_match(&text) {
        return Err(ConfigError::invalid(
            field,
            format!("Must be a decimal between 0 and {max} with at most 2 decimal places"),
        ));
    }
    let value: f64 = text
        .parse()
        .map_err(|_| ConfigError::invalid(field, "Must be a decimal"))?;

    if value <= 0.0 {
        return Err(ConfigError::invalid(field, "Must be greater than 0"));
    }
    if value > max {
        return Err(ConfigError::invalid(
            field,
            format!("Must be less than or equal to {max}"),
        ));
    }

    Ok(FieldValue::Decimal(value))
}

/// Boolean-like fields accept a native boolean or the literal strings
/// `"true"` / `"false"`. Absence yields `default`.
pub fn boolean(field: &str, raw: Option<&RawValue>, default: bool) -> Result<FieldValue, ConfigError> {
    match raw {
        None => Ok(FieldValue::Bool(default)),
        Some(RawValue::Bool(b)) => Ok(FieldValue::Bool(*b)),
        Some(RawValue::Str(s)) => match s.as_str() {
            "true" => Ok(FieldValue::Bool(true)),
            "false" => Ok(FieldValue::Bool(false)),
            _ => Err(ConfigError::invalid(field, "Must be a boolean(true or false)")),
        },
        Some(_) => Err(ConfigError::invalid(field, "Must be a boolean(true or false)")),
    }
}

/// List-like fields accept a comma-separated string or a list.
///
/// Elements are split on commas, trimmed, emptied ones dropped and
/// duplicates removed, keeping the first occurrence.
pub fn list(field: &str, raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    let items = match raw {
        None => Vec::new(),
        Some(RawValue::Str(s)) => vec![s.clone()],
        Some(RawValue::List(items)) => items.clone(),
        Some(RawValue::Bool(_)) | Some(RawValue::Section(_)) => {
            return Err(ConfigError::invalid(
                field,
                "Must be a comma-separated string or a list",
            ));
        }
    };

    let mut out: Vec<String> = Vec::new();
    for piece in items.iter().flat_map(|item| item.split(',')) {
        let piece = piece.trim();
        if !piece.is_empty() && !out.iter().any(|existing| existing == piece) {
            out.push(piece.to_string());
        }
    }

    Ok(FieldValue::List(out))
}

/// Free text. Absence yields `default`; surrounding whitespace is trimmed.
pub fn text(field: &str, raw: Option<&RawValue>, default: &str) -> Result<FieldValue, ConfigError> {
    match raw {
        None => Ok(FieldValue::Text(default.to_string())),
        Some(RawValue::Str(s)) => Ok(FieldValue::Text(s.trim().to_string())),
        Some(_) => Err(ConfigError::invalid(field, "Must be a string")),
    }
}

/// A value from a fixed allow-list; absent or empty yields the first entry.
pub fn allow_listed(
    field: &str,
    raw: Option<&RawValue>,
    allowed: &[&str],
) -> Result<FieldValue, ConfigError> {
    let default = allowed.first().copied().unwrap_or_default();
    let Some(value) = scalar(field, raw)? else {
        return Ok(FieldValue::Text(default.to_string()));
    };

    if allowed.contains(&value.as_str()) {
        Ok(FieldValue::Text(value))
    } else {
        Err(ConfigError::invalid(
            field,
            format!("Must be one of: {}", allowed.join(", ")),
        ))
    }
}

/// An http(s) endpoint; a trailing slash is removed.
pub fn url(field: &str, raw: Option<&RawValue>, default: &str) -> Result<FieldValue, ConfigError> {
    let Some(value) = scalar(field, raw)? else {
        return Ok(FieldValue::Text(default.to_string()));
    };

    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::invalid(field, "Must be a URL starting with http:// or https://"));
    }

    Ok(FieldValue::Text(value.trim_end_matches('/').to_string()))
}

// --- Common validators, shared by the general table and every backend ---

pub fn locale(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    let Some(value) = scalar("locale", raw)? else {
        return Ok(FieldValue::Text("en".to_string()));
    };
    if !LOCALE_RE.is_match(&value) {
        return Err(ConfigError::invalid(
            "locale",
            "Must be a valid locale (letters and dashes/underscores)",
        ));
    }
    Ok(FieldValue::Text(value))
}

pub fn generate(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    integer("generate", raw, 1, 1, Some(MAX_GENERATE))
}

/// The commit style. Absent means `conventional`; an explicit empty string
/// selects the untyped style.
pub fn commit_type(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    let value = match raw {
        None => return Ok(FieldValue::Text("conventional".to_string())),
        Some(RawValue::Str(s)) => s.trim().to_string(),
        Some(_) => return Err(ConfigError::invalid("type", "Must be a string")),
    };

    if COMMIT_TYPES.contains(&value.as_str()) {
        Ok(FieldValue::Text(value))
    } else {
        Err(ConfigError::invalid(
            "type",
            "Invalid commit type. Must be one of: conventional, gitmoji, or empty",
        ))
    }
}

pub fn max_length(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    integer("maxLength", raw, 50, MIN_MAX_LENGTH, None)
}

pub fn timeout(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    integer("timeout", raw, DEFAULT_TIMEOUT_MS, MIN_TIMEOUT_MS, None)
}

pub fn temperature(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    decimal("temperature", raw, 0.7, 2.0)
}

pub fn top_p(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    decimal("topP", raw, 0.9, 1.0)
}

pub fn max_tokens(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    integer("maxTokens", raw, 1024, 1, None)
}

pub fn logging(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    boolean("logging", raw, true)
}

pub fn include_body(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    boolean("includeBody", raw, false)
}

pub fn code_review(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    boolean("codeReview", raw, false)
}

pub fn disabled(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    boolean("disabled", raw, false)
}

pub fn exclude(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    list("exclude", raw)
}

pub fn system_prompt(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    text("systemPrompt", raw, "")
}

pub fn system_prompt_path(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    text("systemPromptPath", raw, "")
}

pub fn key(raw: Option<&RawValue>) -> Result<FieldValue, ConfigError> {
    text("key", raw, "")
}
