//! Integration tests for the persisted config document.

mod common;

use std::path::PathBuf;
use std::time::Duration;

use polycommit::config::{CONFIG_PATH_ENV_VAR, CliOverrides, ConfigStore, RawValue, resolve};
use polycommit::{Backend, ConfigError};
use serial_test::serial;

use common::{store_with, temp_test_dir};

#[test]
fn test_save_then_load_round_trips_through_resolve() {
    let dir = temp_test_dir();
    let store = ConfigStore::new(dir.path().join("nested/.polycommit"));

    store
        .save(&[
            ("generate", RawValue::from("3")),
            ("temperature", RawValue::from("1.25")),
            ("includeBody", RawValue::from("true")),
            ("OPENAI.key", RawValue::from("sk-test")),
            ("OPENAI.model", RawValue::from("gpt-4o")),
            ("OLLAMA.timeout", RawValue::from("30000")),
        ])
        .unwrap();

    let config = resolve(&CliOverrides::default(), &store.load().unwrap()).unwrap();
    assert_eq!(config.general.generate, 3);
    assert_eq!(config.general.temperature, 1.25);
    assert!(config.general.include_body);

    let openai = config.backend(Backend::OpenAi).unwrap();
    assert_eq!(openai.key, "sk-test");
    assert_eq!(openai.models, vec!["gpt-4o"]);

    let ollama = config.backend(Backend::Ollama).unwrap();
    assert_eq!(ollama.settings.timeout, Duration::from_millis(30_000));
}

#[test]
fn test_values_are_persisted_in_native_form() {
    let dir = temp_test_dir();
    let store = ConfigStore::new(dir.path().join(".polycommit"));
    store
        .save(&[
            ("generate", RawValue::from("2")),
            ("logging", RawValue::from("false")),
            ("exclude", RawValue::from("a.txt, b.txt")),
        ])
        .unwrap();

    let content = std::fs::read_to_string(store.path()).unwrap();
    assert!(content.contains("generate = 2"));
    assert!(content.contains("logging = false"));
    assert!(content.contains("exclude = ["));
    assert!(content.contains(r#""a.txt""#) && content.contains(r#""b.txt""#));
}

#[test]
fn test_list_normalization_on_reload() {
    let dir = temp_test_dir();
    let store = store_with(
        dir.path(),
        r#"
exclude = "dist/"

[OLLAMA]
model = [" llama3.2 ", "", "qwen2.5-coder"]
"#,
    );

    let persisted = store.load().unwrap();
    assert_eq!(
        persisted.get("exclude"),
        Some(&RawValue::List(vec!["dist/".to_string()]))
    );

    let config = resolve(&CliOverrides::default(), &persisted).unwrap();
    assert_eq!(config.general.exclude, vec!["dist/"]);
    assert_eq!(
        config.backend(Backend::Ollama).unwrap().models,
        vec!["llama3.2", "qwen2.5-coder"]
    );
}

#[test]
fn test_append_extends_ollama_models_without_duplicates() {
    let dir = temp_test_dir();
    let store = store_with(dir.path(), "[OLLAMA]\nmodel = [\"llama3.2\"]\n");

    store.append("OLLAMA.model", RawValue::from("qwen2.5-coder,llama3.2")).unwrap();
    store.append("ollama.model", RawValue::from("phi4")).unwrap();

    let got = store.get(&["OLLAMA.model"]).unwrap();
    assert_eq!(
        got,
        vec![(
            "OLLAMA.model".to_string(),
            Some(RawValue::List(vec![
                "llama3.2".to_string(),
                "qwen2.5-coder".to_string(),
                "phi4".to_string(),
            ]))
        )]
    );
}

#[test]
fn test_get_reports_missing_keys() {
    let dir = temp_test_dir();
    let store = store_with(dir.path(), "locale = \"ko\"\n");

    let got = store.get(&["locale", "generate", "GROQ.key"]).unwrap();
    assert_eq!(got[0], ("locale".to_string(), Some(RawValue::from("ko"))));
    assert_eq!(got[1], ("generate".to_string(), None));
    assert_eq!(got[2], ("GROQ.key".to_string(), None));
}

#[test]
fn test_invalid_value_is_not_saved() {
    let dir = temp_test_dir();
    let store = store_with(dir.path(), "locale = \"en\"\n");

    let err = store.save(&[("timeout", RawValue::from("100"))]).unwrap_err();
    assert_eq!(err.field(), Some("timeout"));
    assert!(!std::fs::read_to_string(store.path()).unwrap().contains("timeout"));
}

#[test]
fn test_unparseable_file_is_a_parse_error() {
    let dir = temp_test_dir();
    let store = store_with(dir.path(), "generate = = 3\n");

    let err = store.load().unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
#[serial]
fn test_default_location_honours_env_var() {
    let dir = temp_test_dir();
    let path = dir.path().join("custom.toml");

    temp_env::with_var(CONFIG_PATH_ENV_VAR, Some(path.as_os_str()), || {
        assert_eq!(ConfigStore::default_location().path(), path.as_path());
    });
}

#[test]
#[serial]
fn test_default_location_falls_back_to_home() {
    temp_env::with_var(CONFIG_PATH_ENV_VAR, None::<&str>, || {
        let store = ConfigStore::default_location();
        let expected = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".polycommit");
        assert_eq!(store.path(), expected.as_path());
    });
}
