//! polycommit - CLI entry point.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use git2::Repository;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use polycommit::commit::{choose, collect_staged_diff, commit_staged, stage_tracked};
use polycommit::config::{
    Backend, CliOverrides, ConfigStore, RawConfig, RawValue, ValidConfig, parse_overrides, resolve,
};
use polycommit::engine::{Engine, GenerationCandidate, GenerationPrompt, HttpBackendFactory};

/// Environment variable holding the tracing filter.
const LOG_ENV_VAR: &str = "POLYCOMMIT_LOG";

/// Generate commit messages from the staged diff with several AI backends.
#[derive(Parser, Debug)]
#[command(name = "polycommit")]
#[command(about = "Generate commit messages from the staged diff with several AI backends")]
#[command(version)]
#[command(after_help = "Any config field can be overridden after `--`:\n  \
    polycommit -- --maxLength=72 --OPENAI.model=gpt-4o")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Number of messages to generate per backend (1-5)
    #[arg(short, long)]
    generate: Option<String>,

    /// Locale of the generated messages (e.g. en, de, pt-BR)
    #[arg(short, long)]
    locale: Option<String>,

    /// Commit style: conventional, gitmoji, or "" for none
    #[arg(short = 't', long = "type")]
    commit_type: Option<String>,

    /// Files to leave out of the diff (comma-separated)
    #[arg(short = 'x', long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Stage modified and deleted tracked files first
    #[arg(short, long)]
    all: bool,

    /// Commit with the first successful message without prompting
    #[arg(long)]
    first: bool,

    /// Print the chosen message instead of committing
    #[arg(long)]
    dry_run: bool,

    /// Backends to skip for this run (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Vec<Backend>,

    /// Only use these backends for this run (comma-separated)
    #[arg(long, value_delimiter = ',')]
    only: Vec<Backend>,

    /// Raw `--key=value` and `--BACKEND.key=value` overrides
    #[arg(last = true)]
    overrides: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read or write the persisted configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print persisted values (all of them when no key is given)
    Get { keys: Vec<String> },
    /// Validate and persist `key=value` pairs
    Set {
        #[arg(required = true)]
        pairs: Vec<String>,
    },
    /// Append models to OLLAMA.model
    Add { pair: String },
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    let store = ConfigStore::default_location();

    if let Some(Command::Config { action }) = cli.command.take() {
        init_tracing(false);
        return run_config(&store, action);
    }

    // Step 1: Resolve configuration
    let overrides = build_overrides(&cli)?;
    let persisted = store
        .load()
        .with_context(|| format!("Failed to load {}", store.path().display()))?;
    let config = Arc::new(resolve(&overrides, &persisted)?);
    init_tracing(config.general.logging);

    let enabled: Vec<&str> = config.enabled_backends().map(|b| b.backend.as_str()).collect();
    if enabled.is_empty() {
        bail!(
            "No AI backend is configured. Set one with e.g. `polycommit config set OPENAI.key=<key>`"
        );
    }

    // Step 2: Collect the staged diff
    let repo = Repository::discover(".")
        .context("Not a git repository. Run polycommit from within a git repository.")?;
    if cli.all {
        stage_tracked(&repo).context("Failed to stage tracked files")?;
    }
    let diff = collect_staged_diff(&repo, &config.general.exclude)?;

    println!(
        "Detected {} staged file(s) (+{} -{}){}",
        diff.changed_files.len(),
        diff.additions,
        diff.deletions,
        if diff.truncated { ", diff truncated" } else { "" }
    );

    let engine = Engine::new(HttpBackendFactory::default());

    // Step 3: Optional code review, by the backends that have it enabled
    let reviewers: Vec<&str> = config
        .enabled_backends()
        .filter(|b| b.settings.code_review)
        .map(|b| b.backend.as_str())
        .collect();
    if !reviewers.is_empty() {
        println!("Reviewing changes with {}...", reviewers.join(", "));
        let reviews = collect(
            &engine,
            Arc::clone(&config),
            GenerationPrompt::code_review(diff.diff_text.clone()),
            false,
        )
        .await?;
        for review in reviews {
            println!("\n── {} ──", review.source);
            println!("{}", review.text);
        }
        println!();
    }

    // Step 4: Generate and pick a message
    println!("Generating commit messages with {}...", enabled.join(", "));
    let candidates = collect(
        &engine,
        Arc::clone(&config),
        GenerationPrompt::commit_message(diff.diff_text),
        cli.first,
    )
    .await?;

    let chosen = if cli.first {
        polycommit::commit::first_selectable(&candidates)
            .ok_or(polycommit::SelectError::NothingSelectable)?
    } else {
        choose(&candidates)?
    };

    // Step 5: Commit or display
    if cli.dry_run {
        println!("\n{}", chosen.text);
        return Ok(());
    }

    let oid = commit_staged(&repo, &chosen.text)?;
    let short = oid.to_string();
    println!("✓ Committed {}", &short[..short.len().min(7)]);

    Ok(())
}

/// Run one generation pass, echoing progress as candidates arrive.
///
/// Candidates are only echoed to stderr while the pass runs; the picker
/// is shown once the stream has ended and does not update incrementally.
/// With `stop_at_first`, the pass is cancelled as soon as one usable
/// message has arrived.
async fn collect(
    engine: &Engine,
    config: Arc<ValidConfig>,
    prompt: GenerationPrompt,
    stop_at_first: bool,
) -> Result<Vec<GenerationCandidate>> {
    let mut stream = engine.generate(config, prompt);

    let cancel = stream.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut candidates = Vec::new();
    let mut stopped_early = false;
    while let Some(candidate) = stream.next().await {
        let marker = if candidate.is_error { "✗" } else { "✓" };
        eprintln!("  {} {}", marker, candidate.label);

        let usable = !candidate.is_error;
        candidates.push(candidate);
        if stop_at_first && usable {
            stream.cancel();
            stopped_early = true;
            break;
        }
    }

    ctrl_c.abort();
    if !stopped_early && stream.cancel_handle().is_cancelled() {
        bail!("Cancelled");
    }

    Ok(candidates)
}

fn build_overrides(cli: &Cli) -> Result<CliOverrides> {
    let mut overrides = CliOverrides::default();

    if let Some(generate) = &cli.generate {
        overrides.set_general("generate", generate.as_str());
    }
    if let Some(locale) = &cli.locale {
        overrides.set_general("locale", locale.as_str());
    }
    if let Some(commit_type) = &cli.commit_type {
        overrides.set_general("type", commit_type.as_str());
    }
    if !cli.exclude.is_empty() {
        overrides.set_general("exclude", cli.exclude.clone());
    }

    if !cli.only.is_empty() {
        for backend in Backend::ALL {
            overrides.set_section(backend, disabled_section(!cli.only.contains(&backend)));
        }
    }
    for backend in &cli.disable {
        overrides.set_section(*backend, disabled_section(true));
    }

    parse_overrides(&cli.overrides, &mut overrides)?;
    Ok(overrides)
}

fn disabled_section(disabled: bool) -> RawConfig {
    RawConfig::from([("disabled".to_string(), RawValue::Bool(disabled))])
}

fn run_config(store: &ConfigStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => println!("{}", store.path().display()),
        ConfigAction::Get { keys } if keys.is_empty() => {
            for (key, value) in flatten(&store.load()?) {
                println!("{}={}", key, value);
            }
        }
        ConfigAction::Get { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            for (key, value) in store.get(&keys)? {
                println!("{}={}", key, value.as_ref().map(display_raw).unwrap_or_default());
            }
        }
        ConfigAction::Set { pairs } => {
            let updates = pairs
                .iter()
                .map(|pair| split_pair(pair))
                .collect::<Result<Vec<_>>>()?;
            store.save(&updates)?;
            println!("✓ Saved {}", store.path().display());
        }
        ConfigAction::Add { pair } => {
            let (key, value) = split_pair(&pair)?;
            store.append(&key, value)?;
            println!("✓ Saved {}", store.path().display());
        }
    }
    Ok(())
}

fn split_pair(pair: &str) -> Result<(String, RawValue)> {
    let (key, value) = pair
        .split_once('=')
        .with_context(|| format!("Expected key=value, got '{}'", pair))?;
    Ok((key.to_string(), RawValue::from(value)))
}

/// `key=value` lines, general fields first, then `BACKEND.key` entries.
fn flatten(config: &RawConfig) -> Vec<(String, String)> {
    let mut general = Vec::new();
    let mut scoped = Vec::new();
    for (key, value) in config {
        match value.as_section() {
            Some(section) => scoped.extend(
                section
                    .iter()
                    .map(|(field, v)| (format!("{}.{}", key, field), display_raw(v))),
            ),
            None => general.push((key.clone(), display_raw(value))),
        }
    }
    general.extend(scoped);
    general
}

fn display_raw(value: &RawValue) -> String {
    match value {
        RawValue::Bool(b) => b.to_string(),
        RawValue::Str(s) => s.clone(),
        RawValue::List(items) => items.join(","),
        RawValue::Section(_) => String::new(),
    }
}

fn init_tracing(logging: bool) {
    let default = if logging {
        "warn,polycommit::engine=info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
