//! System prompts sent alongside the staged diff.

use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::warn;

use crate::config::resolve::{CommitStyle, GenerationSettings};

/// Maximum length for sanitized diff text.
pub const MAX_DIFF_SANITIZED_LENGTH: usize = 30_000;

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("Invalid regex"));

/// What the backends are asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    CommitMessage,
    CodeReview,
}

/// Build the system prompt for one backend's settings.
///
/// A non-empty `systemPrompt` replaces the built-in commit prompt;
/// `systemPromptPath` loads one from disk. A path that cannot be read falls
/// back to the built-in prompt with a warning.
pub fn build_system_prompt(kind: PromptKind, settings: &GenerationSettings) -> String {
    match kind {
        PromptKind::CommitMessage => custom_prompt(settings).unwrap_or_else(|| commit_prompt(settings)),
        PromptKind::CodeReview => review_prompt(settings),
    }
}

fn custom_prompt(settings: &GenerationSettings) -> Option<String> {
    if !settings.system_prompt.is_empty() {
        return Some(settings.system_prompt.clone());
    }
    if settings.system_prompt_path.is_empty() {
        return None;
    }

    match std::fs::read_to_string(&settings.system_prompt_path) {
        Ok(content) if !content.trim().is_empty() => Some(content),
        Ok(_) => None,
        Err(e) => {
            warn!(
                "Could not read system prompt from {}: {}. Using the built-in prompt.",
                settings.system_prompt_path, e
            );
            None
        }
    }
}

fn commit_prompt(settings: &GenerationSettings) -> String {
    let style = match settings.commit_style {
        CommitStyle::Conventional => {
            "Follow the Conventional Commits format: `<type>(<optional scope>): <description>`.\n\
             Type is one of feat, fix, build, chore, ci, docs, style, refactor, perf, test."
        }
        CommitStyle::Gitmoji => {
            "Follow the Gitmoji format: `<emoji> <description>`, choosing the emoji that\n\
             matches the intent (e.g. ✨ new feature, 🐛 bug fix, ♻️ refactor, 📝 docs)."
        }
        CommitStyle::Untyped => "Write a plain subject line without any type prefix.",
    };

    let body_rule = if settings.include_body {
        "Add a body explaining WHY the change was made, wrapped at 72 characters."
    } else {
        "Do not write a body; set \"body\" to an empty string."
    };

    let count = settings.generate;
    let plural = if count == 1 { "" } else { "s" };

    format!(
        r#"You generate git commit messages from staged diffs.

Generate {count} alternative commit message{plural} for the diff the user sends.
Write them in the language with locale code "{locale}".

## Subject Rules
{style}
- Imperative mood, no period at the end
- The subject line MUST be at most {max_length} characters

## Body Rules
{body_rule}

## Output Format
Respond with ONLY a JSON array of {count} object{plural}, no markdown, no explanation:
[{{"subject": "...", "body": "..."}}]"#,
        locale = settings.locale,
        max_length = settings.max_length,
    )
}

fn review_prompt(settings: &GenerationSettings) -> String {
    format!(
        r#"You are a senior engineer reviewing a staged git diff before it is committed.

Point out bugs, risky changes, missing error handling and unclear naming.
Be concise: at most ten bullet points, most important first.
Write the review in the language with locale code "{locale}".
If the diff looks fine, say so in one sentence."#,
        locale = settings.locale,
    )
}

/// Sanitize diff text before sending it to a backend.
///
/// Strips control characters (except newlines and tabs) and ANSI escapes,
/// then truncates to `max_len` bytes on a char boundary.
pub fn sanitize_diff(text: &str, max_len: usize) -> String {
    let without_ansi = ANSI_RE.replace_all(text, "");
    let mut result: String = without_ansi
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    if result.len() > max_len {
        let mut end = max_len;
        while end > 0 && !result.is_char_boundary(end) {
            end -= 1;
        }
        result.truncate(end);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolve::{CliOverrides, resolve};
    use crate::config::value::RawConfig;

    fn settings() -> GenerationSettings {
        resolve(&CliOverrides::default(), &RawConfig::new())
            .unwrap()
            .general
    }

    #[test]
    fn test_commit_prompt_reflects_settings() {
        let mut s = settings();
        s.generate = 3;
        s.locale = "de".into();
        s.max_length = 72;

        let prompt = build_system_prompt(PromptKind::CommitMessage, &s);
        assert!(prompt.contains("Generate 3 alternative commit messages"));
        assert!(prompt.contains("\"de\""));
        assert!(prompt.contains("at most 72 characters"));
        assert!(prompt.contains("Conventional Commits"));
        assert!(prompt.contains("Do not write a body"));
    }

    #[test]
    fn test_gitmoji_and_body_rules() {
        let mut s = settings();
        s.commit_style = CommitStyle::Gitmoji;
        s.include_body = true;

        let prompt = build_system_prompt(PromptKind::CommitMessage, &s);
        assert!(prompt.contains("Gitmoji"));
        assert!(prompt.contains("explaining WHY"));
    }

    #[test]
    fn test_custom_prompt_replaces_builtin() {
        let mut s = settings();
        s.system_prompt = "Be terse.".into();
        assert_eq!(build_system_prompt(PromptKind::CommitMessage, &s), "Be terse.");
    }

    #[test]
    fn test_prompt_path_is_loaded_and_missing_path_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "From file.").unwrap();

        let mut s = settings();
        s.system_prompt_path = path.to_string_lossy().to_string();
        assert_eq!(build_system_prompt(PromptKind::CommitMessage, &s), "From file.");

        s.system_prompt_path = dir.path().join("missing.txt").to_string_lossy().to_string();
        assert!(build_system_prompt(PromptKind::CommitMessage, &s).contains("commit message"));
    }

    #[test]
    fn test_sanitize_diff_strips_ansi_and_truncates() {
        let text = "\x1b[32m+added\x1b[0m\n-removed\u{7}\n";
        assert_eq!(sanitize_diff(text, 1000), "+added\n-removed\n");

        let long = "é".repeat(100);
        let truncated = sanitize_diff(&long, 11);
        assert_eq!(truncated.len(), 10);
    }
}
