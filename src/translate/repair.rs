//! Bulk response parsing.
//!
//! Providers asked for a JSON array regularly wrap it in a code fence, add
//! prose around it, use typographic quotes, or leave quotes unescaped inside
//! strings. Each repair step is tried only when the previous parse failed.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TranslatorError};

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?```").expect("valid regex"));

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("valid regex"));

/// Contents of the first fenced block, or the input unchanged
pub fn strip_code_fence(raw: &str) -> &str {
    match CODE_FENCE.captures(raw).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => raw.trim(),
    }
}

/// Slice from the first `[` or `{` to the last `]` or `}`
pub fn json_span(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let end = text.rfind([']', '}'])?;
    (end > start).then(|| &text[start..=end])
}

/// Replace typographic double and single quotes with ASCII ones
pub fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            other => other,
        })
        .collect()
}

/// Escape quotes that sit inside string values.
///
/// A quote inside a string closes it only when the next non-space character
/// is a JSON delimiter (`,` `]` `}` `:`) or the end of input; any other quote
/// is escaped. Raw line breaks inside strings are escaped too.
pub fn escape_inner_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }

        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }

        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
                if matches!(next, None | Some(',') | Some(']') | Some('}') | Some(':')) {
                    in_string = false;
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }

    out
}

/// All double-quoted substrings, unescaped, in order
pub fn extract_quoted(text: &str) -> Vec<String> {
    QUOTED
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| {
            serde_json::from_str::<String>(&format!("\"{}\"", m.as_str()))
                .unwrap_or_else(|_| m.as_str().to_string())
        })
        .collect()
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse a JSON array of translations, also accepting an object that wraps one
fn parse_array(text: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(items.into_iter().map(value_to_text).collect()),
        Value::Object(fields) => fields.into_iter().find_map(|(_, value)| match value {
            Value::Array(items) => Some(items.into_iter().map(value_to_text).collect()),
            _ => None,
        }),
        _ => None,
    }
}

fn check_length(items: Vec<String>, expected: usize) -> Result<Vec<String>> {
    if items.len() == expected {
        Ok(items)
    } else {
        Err(TranslatorError::ResponseFormat(format!(
            "expected {} translations, got {}",
            expected,
            items.len()
        )))
    }
}

/// Turn a raw bulk answer into exactly `expected` strings, or fail the batch
pub fn parse_bulk_response(raw: &str, expected: usize) -> Result<Vec<String>> {
    let unfenced = strip_code_fence(raw);
    let span = json_span(unfenced).unwrap_or(unfenced);

    if let Some(items) = parse_array(span) {
        return check_length(items, expected);
    }

    let normalized = normalize_quotes(span);
    if let Some(items) = parse_array(&normalized) {
        debug!("Bulk response parsed after quote normalization");
        return check_length(items, expected);
    }

    let escaped = escape_inner_quotes(&normalized);
    if let Some(items) = parse_array(&escaped) {
        debug!("Bulk response parsed after escaping inner quotes");
        return check_length(items, expected);
    }

    let extracted = extract_quoted(&normalized);
    if extracted.len() == expected && expected > 0 {
        debug!("Bulk response recovered by positional extraction");
        return Ok(extracted);
    }

    Err(TranslatorError::ResponseFormat(format!(
        "could not parse a {}-item JSON array from: {}",
        expected,
        raw.chars().take(200).collect::<String>()
    )))
}
