//! The persisted configuration document.
//!
//! A TOML file whose top-level keys are general fields and whose tables are
//! named after backends:
//!
//! ```toml
//! generate = 2
//! exclude = ["Cargo.lock"]
//!
//! [OPENAI]
//! key = "sk-..."
//! model = "gpt-4o"
//!
//! [OLLAMA]
//! model = ["llama3.2", "qwen2.5-coder"]
//! ```

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

use toml_edit::{Array, DocumentMut, Item, Table, TableLike, Value};
use tracing::debug;

use crate::config::fields::FieldValue;
use crate::config::registry::{self, Backend, FieldKind, FieldSpec};
use crate::config::value::{RawConfig, RawValue};
use crate::error::ConfigError;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV_VAR: &str = "POLYCOMMIT_CONFIG";

const DEFAULT_FILE_NAME: &str = ".polycommit";

/// The only key that supports [`ConfigStore::append`].
const APPENDABLE_BACKEND: Backend = Backend::Ollama;
const APPENDABLE_FIELD: &str = "model";

/// Reads and writes the persisted config document.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$POLYCOMMIT_CONFIG` if set, otherwise `~/.polycommit`.
    pub fn default_location() -> Self {
        match env::var(CONFIG_PATH_ENV_VAR) {
            Ok(path) if !path.is_empty() => Self::new(path),
            _ => {
                let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
                Self::new(home.join(DEFAULT_FILE_NAME))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document as raw values.
    ///
    /// A missing file is an empty config. List-shaped fields are always
    /// returned as [`RawValue::List`], even when persisted as a bare string.
    pub fn load(&self) -> Result<RawConfig, ConfigError> {
        let Some(doc) = self.read_document()? else {
            return Ok(RawConfig::new());
        };

        let mut config = RawConfig::new();
        for (key, item) in doc.iter() {
            let Some(value) = raw_from_item(item) else {
                continue;
            };

            let (key, value) = match (key.parse::<Backend>(), value) {
                (Ok(backend), RawValue::Section(section)) => (
                    backend.as_str().to_string(),
                    RawValue::Section(normalize_section(Some(backend), section)),
                ),
                (_, value) => (
                    key.to_string(),
                    normalize_field(registry::general_field(key), value),
                ),
            };
            config.insert(key, value);
        }

        Ok(config)
    }

    /// Validate and write `updates` in order, then replace the file.
    ///
    /// Plain keys address general fields, `BACKEND.field` keys address a
    /// backend table. Nothing is written unless every update validates.
    pub fn save<K: AsRef<str>>(&self, updates: &[(K, RawValue)]) -> Result<(), ConfigError> {
        let mut doc = self.read_document()?.unwrap_or_default();

        for (key, raw) in updates {
            let key = key.as_ref();
            let (backend, spec) = lookup_key(key)?;
            let value = spec.parse(Some(raw))?;
            let item = item_from_field(key, &value)?;
            write_item(&mut doc, backend, spec.name, item, &self.path)?;
            debug!("Config {} set to {:?}", key, value);
        }

        self.write_document(&doc)
    }

    /// Append values to `OLLAMA.model`, keeping existing entries.
    pub fn append(&self, key: &str, raw: RawValue) -> Result<(), ConfigError> {
        let (backend, spec) = lookup_key(key)?;
        if backend != Some(APPENDABLE_BACKEND) || spec.name != APPENDABLE_FIELD {
            return Err(ConfigError::AppendUnsupported(key.to_string()));
        }

        let added = spec.parse(Some(&raw))?;

        let mut doc = self.read_document()?.unwrap_or_default();
        let mut combined: Vec<String> = doc
            .get(APPENDABLE_BACKEND.as_str())
            .and_then(Item::as_table_like)
            .and_then(|t| t.get(APPENDABLE_FIELD))
            .and_then(raw_from_item)
            .map(|existing| existing.to_list())
            .unwrap_or_default();
        combined.extend(added.as_list().unwrap_or_default().iter().cloned());

        let value = spec.parse(Some(&RawValue::List(combined)))?;
        let item = item_from_field(key, &value)?;
        write_item(&mut doc, backend, spec.name, item, &self.path)?;
        debug!("Config {} extended to {:?}", key, value);

        self.write_document(&doc)
    }

    /// Raw persisted values for the requested keys (`field` or `BACKEND.field`).
    pub fn get(&self, keys: &[&str]) -> Result<Vec<(String, Option<RawValue>)>, ConfigError> {
        let config = self.load()?;
        Ok(keys
            .iter()
            .map(|key| {
                let value = match key.split_once('.') {
                    Some((scope, field)) => scope.parse::<Backend>().ok().and_then(|backend| {
                        config
                            .get(backend.as_str())
                            .and_then(RawValue::as_section)
                            .and_then(|s| s.get(field))
                            .cloned()
                    }),
                    None => config.get(*key).cloned(),
                };
                (key.to_string(), value)
            })
            .collect())
    }

    fn read_document(&self) -> Result<Option<DocumentMut>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;

        content
            .parse::<DocumentMut>()
            .map(Some)
            .map_err(|e| ConfigError::Parse {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    /// Write through a temp file in the same directory and rename it over
    /// the document, so readers never observe a half-written file.
    fn write_document(&self, doc: &DocumentMut) -> Result<(), ConfigError> {
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(doc.to_string().as_bytes()).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        Ok(())
    }
}

/// Resolve a `field` or `BACKEND.field` key to its descriptor.
fn lookup_key(key: &str) -> Result<(Option<Backend>, &'static FieldSpec), ConfigError> {
    let unknown = || ConfigError::UnknownKey(key.to_string());

    match key.split_once('.') {
        Some((scope, field)) => {
            let backend: Backend = scope.parse().map_err(|_| unknown())?;
            let spec = registry::backend_field(backend, field).ok_or_else(unknown)?;
            Ok((Some(backend), spec))
        }
        None => Ok((None, registry::general_field(key).ok_or_else(unknown)?)),
    }
}

fn write_item(
    doc: &mut DocumentMut,
    backend: Option<Backend>,
    field: &str,
    item: Item,
    path: &Path,
) -> Result<(), ConfigError> {
    let Some(backend) = backend else {
        doc.insert(field, item);
        return Ok(());
    };

    let table: &mut dyn TableLike = doc
        .entry(backend.as_str())
        .or_insert_with(|| Item::Table(Table::new()))
        .as_table_like_mut()
        .ok_or_else(|| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: format!("{} must be a table", backend),
        })?;
    table.insert(field, item);
    Ok(())
}

/// Convert a validated value into its native TOML form.
fn item_from_field(key: &str, value: &FieldValue) -> Result<Item, ConfigError> {
    Ok(match value {
        FieldValue::Bool(b) => toml_edit::value(*b),
        FieldValue::Integer(n) => toml_edit::value(
            i64::try_from(*n).map_err(|_| ConfigError::invalid(key, "Value is too large"))?,
        ),
        FieldValue::Decimal(n) => toml_edit::value(*n),
        FieldValue::Text(s) => toml_edit::value(s.as_str()),
        FieldValue::List(items) => {
            let mut array = Array::new();
            for entry in items {
                array.push(entry.as_str());
            }
            toml_edit::value(array)
        }
    })
}

fn raw_from_item(item: &Item) -> Option<RawValue> {
    match item {
        Item::Value(value) => raw_from_value(value),
        Item::Table(table) => Some(RawValue::Section(
            table
                .iter()
                .filter_map(|(k, v)| raw_from_item(v).map(|raw| (k.to_string(), raw)))
                .collect(),
        )),
        Item::None | Item::ArrayOfTables(_) => None,
    }
}

fn raw_from_value(value: &Value) -> Option<RawValue> {
    match value {
        Value::Boolean(b) => Some(RawValue::Bool(*b.value())),
        Value::Array(array) => Some(RawValue::List(
            array.iter().filter_map(scalar_text).collect(),
        )),
        Value::InlineTable(table) => Some(RawValue::Section(
            table
                .iter()
                .filter_map(|(k, v)| raw_from_value(v).map(|raw| (k.to_string(), raw)))
                .collect(),
        )),
        other => scalar_text(other).map(RawValue::Str),
    }
}

/// Textual form of a scalar; numbers keep their TOML spelling.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.value().clone()),
        Value::Integer(n) => Some(n.value().to_string()),
        Value::Float(n) => Some(n.value().to_string()),
        Value::Boolean(b) => Some(b.value().to_string()),
        Value::Datetime(d) => Some(d.value().to_string()),
        Value::Array(_) | Value::InlineTable(_) => None,
    }
}

fn normalize_section(backend: Option<Backend>, section: RawConfig) -> RawConfig {
    section
        .into_iter()
        .map(|(key, value)| {
            let spec = backend.and_then(|b| registry::backend_field(b, &key));
            let value = normalize_field(spec, value);
            (key, value)
        })
        .collect()
}

/// List-shaped fields persisted as a bare string become one-element lists.
fn normalize_field(spec: Option<&FieldSpec>, value: RawValue) -> RawValue {
    match (spec.map(|s| s.kind), value) {
        (Some(FieldKind::List), RawValue::Str(s)) => RawValue::List(vec![s]),
        (_, value) => value,
    }
}
