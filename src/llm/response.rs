//! Turning raw model completions into commit messages.
//!
//! Models are asked for a JSON array of `{subject, body}` objects but often
//! wrap it in markdown fences or chatter. Anything that is not recognisable
//! JSON is treated as a single plain-text message.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct MessageJson {
    #[serde(alias = "title", alias = "message")]
    subject: String,
    #[serde(default)]
    body: Option<String>,
}

/// Extract at most `limit` messages from a completion, in order.
///
/// With `include_body == false` only the subject line is kept.
pub fn parse_messages(completion: &str, limit: usize, include_body: bool) -> Vec<String> {
    let messages = find_json(completion)
        .map(messages_from_json)
        .filter(|messages| !messages.is_empty())
        .unwrap_or_else(|| {
            vec![MessageJson {
                subject: strip_fences(completion),
                body: None,
            }]
        });

    messages
        .into_iter()
        .filter_map(|m| format_message(m, include_body))
        .take(limit)
        .collect()
}

/// The first JSON array or object embedded in `text`.
fn find_json(text: &str) -> Option<Value> {
    text.match_indices(['[', '{']).find_map(|(idx, _)| {
        serde_json::Deserializer::from_str(&text[idx..])
            .into_iter::<Value>()
            .next()
            .and_then(Result::ok)
            .filter(|v| v.is_array() || v.is_object())
    })
}

fn messages_from_json(value: Value) -> Vec<MessageJson> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("messages").or_else(|| map.remove("commits")) {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(map)],
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(subject) => Some(MessageJson { subject, body: None }),
            other => serde_json::from_value(other).ok(),
        })
        .collect()
}

fn format_message(message: MessageJson, include_body: bool) -> Option<String> {
    let subject = message.subject.trim();
    if subject.is_empty() {
        return None;
    }

    let body = message
        .body
        .as_deref()
        .map(str::trim)
        .filter(|b| include_body && !b.is_empty());

    Some(match body {
        Some(body) => format!("{}\n\n{}", subject, body),
        None => subject.to_string(),
    })
}

/// Remove markdown code fences and surrounding quotes.
fn strip_fences(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect();
    lines
        .join("\n")
        .trim()
        .trim_matches(|c: char| c == '"' || c == '`')
        .trim()
        .to_string()
}
