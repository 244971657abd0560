//! Helpers for the chat/vision job type.
//!
//! Chat jobs carry the full OpenAI-style request as their payload; the
//! `prompt` column only holds a short human-readable summary used by the
//! job listing. When the caller asked for a structured reply, the worker's
//! free-form answer is post-processed with [`extract_json_object`].

use serde_json::Value;

/// Maximum number of characters kept from the user's message.
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Summary stored when no user text can be found (image-only requests).
pub const FALLBACK_PROMPT: &str = "Vision chat request";

/// `response_format.type` values that demand a JSON reply.
const STRUCTURED_FORMATS: &[&str] = &["json_object", "json_schema"];

// ---------------------------------------------------------------------------
// Prompt extraction
// ---------------------------------------------------------------------------

/// Best-effort summary of a chat conversation.
///
/// Walks the messages from newest to oldest and returns the text of the
/// most recent `user` message. Content may be a plain string or an array
/// of typed parts, in which case the `text` parts are joined by newlines.
/// The result is trimmed and truncated to [`MAX_PROMPT_CHARS`].
pub fn extract_user_prompt(messages: &[Value]) -> String {
    for message in messages.iter().rev() {
        if message.get("role").and_then(Value::as_str) != Some("user") {
            continue;
        }

        match message.get("content") {
            Some(Value::String(text)) => return truncate_chars(text.trim(), MAX_PROMPT_CHARS),
            Some(Value::Array(parts)) => {
                let texts: Vec<&str> = parts
                    .iter()
                    .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .filter(|text| !text.is_empty())
                    .collect();
                if !texts.is_empty() {
                    return truncate_chars(texts.join("\n").trim(), MAX_PROMPT_CHARS);
                }
            }
            _ => {}
        }
    }

    FALLBACK_PROMPT.to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

// ---------------------------------------------------------------------------
// Structured replies
// ---------------------------------------------------------------------------

/// Whether a request's `response_format` asks for a JSON reply.
pub fn wants_structured_reply(response_format: Option<&Value>) -> bool {
    response_format
        .and_then(|format| format.get("type"))
        .and_then(Value::as_str)
        .is_some_and(|kind| STRUCTURED_FORMATS.contains(&kind))
}

/// Find the first well-formed JSON object embedded in free-form text.
///
/// Models often wrap JSON in prose or Markdown fences. Every `{` is tried
/// as a starting point and the first one that parses as a complete object
/// wins; trailing text after the object is ignored.
pub fn extract_json_object(text: &str) -> Option<Value> {
    text.char_indices()
        .filter(|(_, c)| *c == '{')
        .find_map(|(start, _)| {
            let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
            match stream.next() {
                Some(Ok(value)) if value.is_object() => Some(value),
                _ => None,
            }
        })
}

/// Final assistant content for a completed chat job.
///
/// When `structured` is set and an object can be extracted, the compact
/// serialization of that object is returned; otherwise the raw text.
pub fn finalize_content(raw: &str, structured: bool) -> String {
    if !structured {
        return raw.to_string();
    }
    extract_json_object(raw)
        .map(|value| value.to_string())
        .unwrap_or_else(|| raw.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
