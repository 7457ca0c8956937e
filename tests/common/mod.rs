//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use git2::{Oid, Repository, Signature};

use polycommit::config::{CliOverrides, ConfigStore, RawConfig, ValidConfig, resolve};
use polycommit::{Backend, BackendError, BackendFactory, GenerationBackend, GenerationRequest};

/// Create a temporary directory for test output.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// A config store backed by a file in `dir`, pre-filled with `content`.
pub fn store_with(dir: &Path, content: &str) -> ConfigStore {
    let path = dir.join(".polycommit");
    std::fs::write(&path, content).expect("Failed to write config file");
    ConfigStore::new(path)
}

/// Resolve a TOML document with no command-line overrides.
pub fn resolve_toml(content: &str) -> ValidConfig {
    let dir = temp_test_dir();
    let persisted = store_with(dir.path(), content)
        .load()
        .expect("Failed to load config");
    resolve(&CliOverrides::default(), &persisted).expect("Failed to resolve config")
}

/// Resolve a TOML document with the given command-line overrides.
pub fn resolve_with(cli: &CliOverrides, content: &str) -> ValidConfig {
    let dir = temp_test_dir();
    let persisted: RawConfig = store_with(dir.path(), content)
        .load()
        .expect("Failed to load config");
    resolve(cli, &persisted).expect("Failed to resolve config")
}

/// Scripted behaviour of one fake backend.
#[derive(Debug, Clone)]
pub enum Script {
    Reply(Vec<String>),
    Fail(u16, String),
    Sleep(Duration, Vec<String>),
    Panic,
}

impl Script {
    pub fn reply(messages: &[&str]) -> Self {
        Script::Reply(messages.iter().map(|m| m.to_string()).collect())
    }
}

/// A backend that follows its script and records the models it was asked for.
pub struct FakeBackend {
    script: Script,
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>, BackendError> {
        self.calls.lock().unwrap().push(request.model.clone());
        match &self.script {
            Script::Reply(messages) => Ok(messages.clone()),
            Script::Fail(status, body) => Err(BackendError::Http {
                status: *status,
                body: body.clone(),
            }),
            Script::Sleep(delay, messages) => {
                tokio::time::sleep(*delay).await;
                Ok(messages.clone())
            }
            Script::Panic => panic!("backend exploded"),
        }
    }
}

/// Hands out fake backends by script and remembers every call.
#[derive(Default)]
pub struct FakeFactory {
    scripts: HashMap<Backend, Script>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, backend: Backend, script: Script) -> Self {
        self.scripts.insert(backend, script);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

impl BackendFactory for FakeFactory {
    fn create(&self, backend: Backend) -> Arc<dyn GenerationBackend> {
        let script = self
            .scripts
            .get(&backend)
            .cloned()
            .unwrap_or_else(|| Script::reply(&["chore: default"]));
        Arc::new(FakeBackend {
            script,
            calls: Arc::clone(&self.calls),
        })
    }
}

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository with a configured identity.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        {
            let mut config = repo.config().expect("Failed to open repo config");
            config.set_str("user.name", "Test User").expect("Failed to set user.name");
            config
                .set_str("user.email", "test@example.com")
                .expect("Failed to set user.email");
        }
        Self { dir, repo }
    }

    fn signature(&self) -> Signature<'_> {
        Signature::now("Test User", "test@example.com").expect("Failed to create signature")
    }

    /// Write a file in the working tree without staging it.
    pub fn write(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Write and stage a file.
    pub fn stage(&self, name: &str, content: &str) {
        self.write(name, content);
        let mut index = self.repo.index().expect("Failed to get index");
        index.add_path(Path::new(name)).expect("Failed to add file");
        index.write().expect("Failed to write index");
    }

    /// Commit whatever is staged. Returns the commit OID.
    pub fn commit(&self, message: &str) -> Oid {
        let sig = self.signature();
        let mut index = self.repo.index().expect("Failed to get index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Message of the commit at HEAD.
    pub fn head_message(&self) -> String {
        self.repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .expect("No HEAD commit")
            .message()
            .unwrap_or_default()
            .to_string()
    }
}
