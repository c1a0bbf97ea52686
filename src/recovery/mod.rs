/// Structured-result recovery for free-text model output
///
/// Models wrap JSON in markdown fences, add a sentence before or after it, and
/// routinely stop mid-structure when they hit their output budget. `recover`
/// handles all three; `parse_with_fallback` is the cheaper fence-strip-and-parse
/// path for callers that prefer a fallback over repair.
///
/// A `None` result means "no usable structured value". It is never an error.

pub mod repair;

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use repair::Scan;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    // An opening fence with optional language tag, then everything up to the
    // closing fence or, if the output was cut off, the end of the text.
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)(?:```|\z)").expect("fence regex is valid")
    })
}

/// Remove markdown code fences around a payload, if any.
pub fn strip_fences(raw: &str) -> &str {
    match fence_regex().captures(raw).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => raw.trim(),
    }
}

/// Recover a structured value from raw model text.
pub fn recover(raw: &str) -> Option<Value> {
    let body = strip_fences(raw);
    if body.is_empty() {
        return None;
    }

    for start in payload_starts(body) {
        let payload = &body[start..];
        let scan = Scan::run(payload);

        if let Some(end) = scan.end {
            if let Ok(value) = serde_json::from_str(&payload[..end]) {
                return Some(value);
            }
            continue;
        }

        if let Some(value) = scan.repair(payload) {
            tracing::debug!(
                original_len = payload.len(),
                "Recovered truncated structured output"
            );
            return Some(value);
        }
    }

    // Bare scalars are still valid JSON
    if let Ok(value) = serde_json::from_str(body) {
        return Some(value);
    }

    tracing::debug!(len = raw.len(), "No structured value recoverable from model output");
    None
}

/// Fence-strip and strict parse, with no repair.
pub fn parse_with_fallback(raw: &str) -> Option<Value> {
    let body = strip_fences(raw);
    let start = body.find(|c: char| c == '{' || c == '[').unwrap_or(0);
    serde_json::from_str(body[start..].trim()).ok()
}

/// Most opening brackets tried as the start of the payload.
const MAX_STARTS: usize = 16;

/// Candidate offsets for the start of the payload: every `{` and `[`, earliest
/// first. Prose ahead of the payload occasionally contains brackets of its own.
fn payload_starts(body: &str) -> impl Iterator<Item = usize> + '_ {
    body.char_indices()
        .filter(|(_, c)| matches!(c, '{' | '['))
        .map(|(i, _)| i)
        .take(MAX_STARTS)
}
