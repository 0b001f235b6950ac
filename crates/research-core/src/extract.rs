//! Recover a JSON object embedded in free-form agent output.
//!
//! Strategies are tried in order of decreasing strictness; the first one
//! that yields a decodable object wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::trace;

/// Decoded JSON object recovered from surrounding text.
pub type JsonObject = Map<String, Value>;

/// A single extraction attempt over raw text.
#[derive(Clone, Copy)]
pub struct ExtractionStrategy {
    pub name: &'static str,
    pub extract: fn(&str) -> Option<JsonObject>,
}

static FLAT_REPORT_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{[^{}]*"topic"[^{}]*"abstract"[^{}]*"detailed_findings"[^{}]*\}"#)
        .expect("invalid flat report regex")
});

static LOOSE_REPORT_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)\{.*"topic".*"abstract".*"detailed_findings".*\}"#)
        .expect("invalid loose report regex")
});

static ANY_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("invalid object span regex"));

/// Strategies in the order they are attempted.
pub const STRATEGIES: [ExtractionStrategy; 3] = [
    ExtractionStrategy {
        name: "flat_report_object",
        extract: extract_flat_report_object,
    },
    ExtractionStrategy {
        name: "loose_report_object",
        extract: extract_loose_report_object,
    },
    ExtractionStrategy {
        name: "outermost_braces",
        extract: extract_outermost_braces,
    },
];

/// Run every strategy in order and return the first decoded object.
pub fn extract_object(text: &str) -> Option<(&'static str, JsonObject)> {
    STRATEGIES.iter().find_map(|strategy| {
        let object = (strategy.extract)(text)?;
        trace!(strategy = strategy.name, keys = object.len(), "extracted embedded object");
        Some((strategy.name, object))
    })
}

/// Object whose `topic`, `abstract` and `detailed_findings` keys share one
/// brace level with no nesting.
pub fn extract_flat_report_object(text: &str) -> Option<JsonObject> {
    decode_candidates(text, &FLAT_REPORT_OBJECT)
}

/// The same keys with arbitrary content, nesting included, between them.
pub fn extract_loose_report_object(text: &str) -> Option<JsonObject> {
    decode_candidates(text, &LOOSE_REPORT_OBJECT)
}

/// Anything from the first `{` onward that balances into an object.
pub fn extract_outermost_braces(text: &str) -> Option<JsonObject> {
    decode_candidates(text, &ANY_OBJECT)
}

fn decode_candidates(text: &str, pattern: &Regex) -> Option<JsonObject> {
    pattern.find_iter(text).find_map(|found| {
        let start = found.start();
        let end = balanced_object_end(text, start)?;
        decode_object(&text[start..end])
    })
}

fn decode_object(candidate: &str) -> Option<JsonObject> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Byte offset just past the `}` that closes the object opened at `start`.
///
/// Depth is tracked character by character; braces inside JSON strings are
/// ignored. Returns `None` when `start` is not a `{` or the object never
/// closes.
pub fn balanced_object_end(text: &str, start: usize) -> Option<usize> {
    let tail = text.get(start..)?;
    if !tail.starts_with('{') {
        return None;
    }

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in tail.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}
