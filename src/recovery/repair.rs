/// Truncation repair for machine-generated JSON.
///
/// A single forward pass tracks the container stack and string/escape status
/// and records every point where the text could be cut and still be a valid
/// prefix once the open containers are closed. Repair then tries, in order:
/// closing the text as-is, cutting back to a value boundary, and finally
/// cutting back to just after an opening bracket. Values are never invented;
/// only closing quotes, brackets and braces are appended.

use serde_json::Value;

/// How many cut points are tried before giving up.
const MAX_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CutKind {
    /// After a complete member value or array element.
    Boundary,
    /// Directly after an opening bracket; closes to an empty container.
    Opening,
}

#[derive(Debug, Clone)]
struct CutPoint {
    at: usize,
    kind: CutKind,
    stack: Vec<Open>,
}

/// Result of scanning a payload that starts at its first `{` or `[`.
#[derive(Debug, Default)]
pub(crate) struct Scan {
    stack: Vec<Open>,
    in_string: bool,
    escaped: bool,
    expecting_key: bool,
    trailing_scalar: bool,
    cuts: Vec<CutPoint>,
    /// Byte offset one past the top-level value, if it closed.
    pub(crate) end: Option<usize>,
}

impl Scan {
    pub(crate) fn run(text: &str) -> Scan {
        let mut scan = Scan::default();

        for (i, c) in text.char_indices() {
            if scan.in_string {
                if scan.escaped {
                    scan.escaped = false;
                } else if c == '\\' {
                    scan.escaped = true;
                } else if c == '"' {
                    scan.in_string = false;
                    let is_key = scan.stack.last() == Some(&Open::Object) && scan.expecting_key;
                    if !is_key {
                        scan.mark(i + 1, CutKind::Boundary);
                    }
                }
                continue;
            }

            match c {
                '"' => {
                    scan.in_string = true;
                    scan.trailing_scalar = false;
                }
                '{' | '[' => {
                    scan.stack.push(if c == '{' { Open::Object } else { Open::Array });
                    scan.expecting_key = c == '{';
                    scan.trailing_scalar = false;
                    scan.mark(i + 1, CutKind::Opening);
                }
                '}' | ']' => {
                    scan.stack.pop();
                    scan.trailing_scalar = false;
                    if scan.stack.is_empty() {
                        scan.end = Some(i + 1);
                        break;
                    }
                    scan.expecting_key = false;
                    scan.mark(i + 1, CutKind::Boundary);
                }
                ':' => {
                    scan.expecting_key = false;
                    scan.trailing_scalar = false;
                }
                ',' => {
                    scan.trailing_scalar = false;
                    scan.mark(i, CutKind::Boundary);
                    if scan.stack.last() == Some(&Open::Object) {
                        scan.expecting_key = true;
                    }
                }
                c if c.is_whitespace() => {}
                _ => scan.trailing_scalar = true,
            }
        }

        scan
    }

    fn mark(&mut self, at: usize, kind: CutKind) {
        if self.stack.is_empty() {
            return;
        }
        self.cuts.push(CutPoint {
            at,
            kind,
            stack: self.stack.clone(),
        });
    }

    /// Try to turn a truncated payload into a parseable value.
    pub(crate) fn repair(&self, text: &str) -> Option<Value> {
        if self.end.is_some() || self.stack.is_empty() {
            return None;
        }

        // 1. Close everything that is open right now.
        if !self.trailing_scalar {
            let mut candidate = if self.in_string {
                text.to_string()
            } else {
                trim_dangling(text).to_string()
            };
            if self.in_string {
                if self.escaped {
                    candidate.pop();
                }
                candidate.push('"');
            }
            if !candidate.ends_with(':') {
                candidate.push_str(&closers(&self.stack));
                if let Ok(v) = serde_json::from_str(&candidate) {
                    return Some(v);
                }
            }
        }

        // 2. Cut back to a complete value, then to an opening bracket.
        let boundaries = self.cuts.iter().rev().filter(|c| c.kind == CutKind::Boundary);
        let openings = self.cuts.iter().rev().filter(|c| c.kind == CutKind::Opening);

        boundaries
            .chain(openings)
            .take(MAX_ATTEMPTS)
            .find_map(|cut| {
                let mut candidate = trim_dangling(&text[..cut.at]).to_string();
                candidate.push_str(&closers(&cut.stack));
                serde_json::from_str(&candidate).ok()
            })
    }
}

fn trim_dangling(text: &str) -> &str {
    text.trim_end_matches(|c: char| c.is_whitespace() || c == ',')
}

fn closers(stack: &[Open]) -> String {
    stack
        .iter()
        .rev()
        .map(|open| match open {
            Open::Object => '}',
            Open::Array => ']',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repair(text: &str) -> Option<Value> {
        Scan::run(text).repair(text)
    }

    #[test]
    fn test_complete_value_reports_end() {
        let text = r#"{"a": [1, 2]} trailing words"#;
        let scan = Scan::run(text);
        assert_eq!(scan.end, Some(13));
        assert_eq!(&text[..13], r#"{"a": [1, 2]}"#);
    }

    #[test]
    fn test_closes_open_string_and_containers() {
        let v = repair(r#"{"summary": ["first", "seco"#).unwrap();
        assert_eq!(v, json!({"summary": ["first", "seco"]}));
    }

    #[test]
    fn test_trailing_comma_dropped() {
        let v = repair(r#"{"items": [1, 2, "#).unwrap();
        assert_eq!(v, json!({"items": [1, 2]}));
    }

    #[test]
    fn test_dangling_key_cut_back() {
        let v = repair(r#"{"a": "x", "b"#).unwrap();
        assert_eq!(v, json!({"a": "x"}));

        let v = repair(r#"{"a": "x", "b": "#).unwrap();
        assert_eq!(v, json!({"a": "x"}));
    }

    #[test]
    fn test_partial_literal_is_not_completed() {
        let v = repair(r#"{"a": 1, "b": tr"#).unwrap();
        assert_eq!(v, json!({"a": 1}));

        // A cut number may be missing digits, so it is dropped rather than kept
        let v = repair(r#"{"a": 1, "b": 12"#).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn test_pending_escape_removed() {
        let v = repair(r#"{"quote": "he said \"#).unwrap();
        assert_eq!(v, json!({"quote": "he said "}));
    }

    #[test]
    fn test_nested_closing_order() {
        let v = repair(r#"{"timeline": [{"date": "2024-01-05", "tags": ["a""#).unwrap();
        assert_eq!(v, json!({"timeline": [{"date": "2024-01-05", "tags": ["a"]}]}));
    }

    #[test]
    fn test_prefers_complete_element_over_empty_object() {
        let v = repair(r#"[{"a": 1}, {"b"#).unwrap();
        assert_eq!(v, json!([{"a": 1}]));
    }

    #[test]
    fn test_falls_back_to_empty_container() {
        let v = repair(r#"{"a": {"c"#).unwrap();
        assert_eq!(v, json!({"a": {}}));
    }

    #[test]
    fn test_multibyte_text_cut_is_safe() {
        let v = repair("{\"note\": \"caf\u{e9} \u{2014} d\u{e9}j\u{e0}").unwrap();
        assert_eq!(v, json!({"note": "caf\u{e9} \u{2014} d\u{e9}j\u{e0}"}));
    }
}
