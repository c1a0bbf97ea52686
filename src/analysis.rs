/// Canonical document-analysis result and the normalization path into it
///
/// Every backend returns loosely shaped JSON. `normalize` maps it onto
/// `AnalysisResult`, which always has every list present (possibly empty),
/// stamps each extracted item with the document it came from, and fills in
/// item ids according to an `IdStrategy`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Case-insensitive; anything unrecognized is Medium.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "minor" => Severity::Low,
            "high" | "serious" | "major" => Severity::High,
            "critical" | "severe" => Severity::Critical,
            _ => Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
    Hostile,
}

impl Sentiment {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" | "supportive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            "hostile" | "adversarial" => Sentiment::Hostile,
            _ => Sentiment::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub title: String,
    pub summary: String,
    pub page_estimate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: String,
    pub date: String,
    pub description: String,
    pub quote: String,
    pub severity: Severity,
    pub category: String,
    pub source_doc: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub category: String,
    pub description: String,
    pub source_quote: String,
    pub severity: Severity,
    pub source_doc: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub role: String,
    pub sentiment: Sentiment,
    pub source_doc: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalEvidence {
    pub id: String,
    pub date: String,
    pub condition: String,
    pub description: String,
    pub quote: String,
    pub source_doc: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyReference {
    pub id: String,
    pub policy: String,
    pub section: String,
    pub relevance: String,
    pub quote: String,
    pub source_doc: String,
}

/// Normalized output of a document analysis, whichever provider produced it.
///
/// Lists are always present. Consumers never distinguish "missing" from "empty".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    pub summary: Vec<String>,
    pub chapters: Vec<Chapter>,
    pub key_findings: Vec<String>,
    pub timeline: Vec<TimelineEvent>,
    pub issues: Vec<Issue>,
    pub entities: Vec<Entity>,
    pub medical_evidence: Vec<MedicalEvidence>,
    pub policy_references: Vec<PolicyReference>,
    /// Set when the input was cut to fit the model's context before analysis.
    pub truncated: bool,
}

impl AnalysisResult {
    /// Result used when a provider answered but nothing structured could be read.
    pub fn fallback(raw_text: &str) -> Self {
        AnalysisResult {
            summary: vec![raw_text.trim().to_string()],
            ..AnalysisResult::default()
        }
    }

    pub fn item_count(&self) -> usize {
        self.timeline.len()
            + self.issues.len()
            + self.entities.len()
            + self.medical_evidence.len()
            + self.policy_references.len()
    }
}

/// How ids are filled in for extracted items that arrive without one.
#[derive(Debug, Clone, Copy)]
pub enum IdStrategy<'a> {
    /// Random v4 UUIDs; repeated analyses of one corpus never collide.
    Random,
    /// `<doc_id>-<section>-<index>`; stable across identical responses.
    Positional { doc_id: &'a str },
}

impl IdStrategy<'_> {
    fn id_for(&self, section: &str, index: usize) -> String {
        match self {
            IdStrategy::Random => uuid::Uuid::new_v4().to_string(),
            IdStrategy::Positional { doc_id } => format!("{}-{}-{}", doc_id, section, index),
        }
    }
}

// --- lenient readers (provider field names vary) ---

pub(crate) type Object = serde_json::Map<String, Value>;

/// An extracted item read out of one JSON object.
trait Extracted: Sized {
    const SECTION: &'static str;

    /// `None` when the object carries nothing worth keeping.
    fn read(obj: &Object) -> Option<Self>;

    /// The id and source-document slots, filled in after reading.
    fn slots(&mut self) -> (&mut String, &mut String);
}

impl Chapter {
    fn read(obj: &Object) -> Option<Self> {
        let chapter = Chapter {
            title: text_field(obj, &["title", "heading", "name"]),
            summary: text_field(obj, &["summary", "description"]),
            page_estimate: opt_text_field(obj, &["page_estimate", "pageEstimate", "pages"]),
        };
        (!chapter.title.is_empty() || !chapter.summary.is_empty()).then_some(chapter)
    }
}

impl Extracted for TimelineEvent {
    const SECTION: &'static str = "timeline";

    fn read(obj: &Object) -> Option<Self> {
        let event = TimelineEvent {
            id: text_field(obj, &["id"]),
            date: text_field(obj, &["date", "when"]),
            description: text_field(obj, &["description", "event", "detail", "title"]),
            quote: text_field(obj, &["quote", "evidence", "sourceQuote"]),
            severity: Severity::parse_lenient(&text_field(obj, &["severity"])),
            category: text_field(obj, &["category", "type"]),
            source_doc: String::new(),
        };
        (!event.date.is_empty() || !event.description.is_empty()).then_some(event)
    }

    fn slots(&mut self) -> (&mut String, &mut String) {
        (&mut self.id, &mut self.source_doc)
    }
}

impl Extracted for Issue {
    const SECTION: &'static str = "issue";

    fn read(obj: &Object) -> Option<Self> {
        let issue = Issue {
            id: text_field(obj, &["id"]),
            category: text_field(obj, &["category", "type"]),
            description: text_field(obj, &["description", "issue", "detail"]),
            source_quote: text_field(obj, &["source_quote", "sourceQuote", "quote", "evidence"]),
            severity: Severity::parse_lenient(&text_field(obj, &["severity"])),
            source_doc: String::new(),
        };
        (!issue.description.is_empty()).then_some(issue)
    }

    fn slots(&mut self) -> (&mut String, &mut String) {
        (&mut self.id, &mut self.source_doc)
    }
}

impl Extracted for Entity {
    const SECTION: &'static str = "entity";

    fn read(obj: &Object) -> Option<Self> {
        let entity = Entity {
            id: text_field(obj, &["id"]),
            name: text_field(obj, &["name"]),
            role: text_field(obj, &["role", "position", "title"]),
            sentiment: Sentiment::parse_lenient(&text_field(obj, &["sentiment", "stance"])),
            source_doc: String::new(),
        };
        (!entity.name.is_empty()).then_some(entity)
    }

    fn slots(&mut self) -> (&mut String, &mut String) {
        (&mut self.id, &mut self.source_doc)
    }
}

impl Extracted for MedicalEvidence {
    const SECTION: &'static str = "medical";

    fn read(obj: &Object) -> Option<Self> {
        let evidence = MedicalEvidence {
            id: text_field(obj, &["id"]),
            date: text_field(obj, &["date"]),
            condition: text_field(obj, &["condition", "diagnosis"]),
            description: text_field(obj, &["description", "detail", "summary"]),
            quote: text_field(obj, &["quote", "evidence", "sourceQuote"]),
            source_doc: String::new(),
        };
        (!evidence.condition.is_empty() || !evidence.description.is_empty()).then_some(evidence)
    }

    fn slots(&mut self) -> (&mut String, &mut String) {
        (&mut self.id, &mut self.source_doc)
    }
}

impl Extracted for PolicyReference {
    const SECTION: &'static str = "policy";

    fn read(obj: &Object) -> Option<Self> {
        let reference = PolicyReference {
            id: text_field(obj, &["id"]),
            policy: text_field(obj, &["policy", "name", "title", "policyName"]),
            section: text_field(obj, &["section", "clause"]),
            relevance: text_field(obj, &["relevance", "breach", "detail"]),
            quote: text_field(obj, &["quote", "evidence", "sourceQuote"]),
            source_doc: String::new(),
        };
        (!reference.policy.is_empty()).then_some(reference)
    }

    fn slots(&mut self) -> (&mut String, &mut String) {
        (&mut self.id, &mut self.source_doc)
    }
}

pub(crate) fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First present field among `keys`, looked up in order.
pub(crate) fn field<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// Text of the first of `keys` holding a non-empty scalar. Models often send
/// several spellings of one field; the earlier key wins and none is an error.
pub(crate) fn text_field(obj: &Object, keys: &[&str]) -> String {
    opt_text_field(obj, keys).unwrap_or_default()
}

pub(crate) fn opt_text_field(obj: &Object, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(scalar_text))
        .find(|s| !s.is_empty())
}

/// A list of strings from a string, a list of strings, or a list of objects with text fields.
pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(o) => opt_text_field(o, &["text", "finding", "point", "summary", "description"]),
                other => scalar_text(other),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Items of a list field; non-objects and objects `read` refuses are skipped.
pub(crate) fn items<T>(value: Option<&Value>, read: impl Fn(&Object) -> Option<T>) -> Vec<T> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).filter_map(|o| read(o)).collect(),
        _ => Vec::new(),
    }
}

fn extract<T: Extracted>(value: Option<&Value>, source_doc: &str, ids: IdStrategy<'_>) -> Vec<T> {
    items(value, T::read)
        .into_iter()
        .enumerate()
        .map(|(i, mut item)| {
            let (id, source) = item.slots();
            if id.is_empty() {
                *id = ids.id_for(T::SECTION, i);
            }
            *source = source_doc.to_string();
            item
        })
        .collect()
}

/// Map a backend's JSON onto the canonical result.
///
/// `source_doc` is stamped on every extracted item. Items with no meaningful
/// content (e.g. an empty object left behind by truncation repair) are dropped.
pub fn normalize(value: &Value, source_doc: &str, ids: IdStrategy<'_>) -> AnalysisResult {
    let empty = Object::new();
    let obj = match value {
        Value::Object(o) => o,
        _ => &empty,
    };

    AnalysisResult {
        summary: string_list(field(obj, &["summary", "overview"])),
        chapters: items(field(obj, &["chapters", "chapterBreakdown", "sections"]), Chapter::read),
        key_findings: string_list(field(obj, &["keyFindings", "key_findings", "findings"])),
        timeline: extract(field(obj, &["timeline", "events"]), source_doc, ids),
        issues: extract(field(obj, &["issues", "potentialIssues", "legalIssues"]), source_doc, ids),
        entities: extract(field(obj, &["entities", "people", "parties"]), source_doc, ids),
        medical_evidence: extract(field(obj, &["medicalEvidence", "medical_evidence", "medical"]), source_doc, ids),
        policy_references: extract(field(obj, &["policyReferences", "policy_references", "policies"]), source_doc, ids),
        truncated: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_lists_default_to_empty() {
        let result = normalize(&json!({"summary": "Short letter."}), "letter.pdf", IdStrategy::Random);
        assert_eq!(result.summary, vec!["Short letter.".to_string()]);
        assert!(result.chapters.is_empty());
        assert!(result.key_findings.is_empty());
        assert!(result.timeline.is_empty());
        assert!(result.issues.is_empty());
        assert!(result.entities.is_empty());
        assert!(result.medical_evidence.is_empty());
        assert!(result.policy_references.is_empty());

        // serialized form carries every list, never omits one
        let wire = serde_json::to_value(&result).unwrap();
        for key in ["chapters", "keyFindings", "timeline", "issues", "entities", "medicalEvidence", "policyReferences"] {
            assert_eq!(wire[key], json!([]), "{} should serialize as []", key);
        }
    }

    #[test]
    fn test_non_object_input_yields_empty_result() {
        let result = normalize(&json!(["not", "an", "object"]), "a.txt", IdStrategy::Random);
        assert_eq!(result, AnalysisResult::default());
    }

    #[test]
    fn test_items_stamped_with_source_doc() {
        let value = json!({
            "timeline": [{"date": "2024-01-05", "description": "Warning issued", "severity": "high"}],
            "issues": [{"category": "Procedure", "description": "No hearing held", "quote": "no meeting"}],
            "entities": [{"name": "HR", "role": "Department", "stance": "hostile"}]
        });
        let result = normalize(&value, "notes.txt", IdStrategy::Random);
        assert_eq!(result.timeline[0].source_doc, "notes.txt");
        assert_eq!(result.timeline[0].severity, Severity::High);
        assert_eq!(result.issues[0].source_doc, "notes.txt");
        assert_eq!(result.issues[0].source_quote, "no meeting");
        assert_eq!(result.entities[0].sentiment, Sentiment::Hostile);
    }

    #[test]
    fn test_random_ids_do_not_collide() {
        let value = json!({"timeline": [{"date": "2024-01-05", "description": "x"}]});
        let a = normalize(&value, "d", IdStrategy::Random);
        let b = normalize(&value, "d", IdStrategy::Random);
        assert_ne!(a.timeline[0].id, b.timeline[0].id);
    }

    #[test]
    fn test_positional_ids_are_deterministic_and_existing_ids_kept() {
        let value = json!({"timeline": [
            {"date": "2024-01-05", "description": "x"},
            {"id": "given", "date": "2024-01-06", "description": "y"}
        ]});
        let result = normalize(&value, "doc.txt", IdStrategy::Positional { doc_id: "doc-9" });
        assert_eq!(result.timeline[0].id, "doc-9-timeline-0");
        assert_eq!(result.timeline[1].id, "given");
    }

    #[test]
    fn test_malformed_items_skipped() {
        let value = json!({
            "timeline": ["just a string", {}, {"when": 2024, "event": "Dismissed"}],
            "keyFindings": [{"finding": "No investigation"}, "Late payslips", 3]
        });
        let result = normalize(&value, "d", IdStrategy::Random);
        assert_eq!(result.timeline.len(), 1);
        assert_eq!(result.timeline[0].date, "2024");
        assert_eq!(result.timeline[0].description, "Dismissed");
        assert_eq!(result.key_findings, vec!["No investigation", "Late payslips", "3"]);
    }

    #[test]
    fn test_alternate_spellings_alongside_canonical_names() {
        let value = json!({
            "timeline": [{"date": "2024-01-05", "title": "Verbal warning", "description": "Manager issued a verbal warning"}],
            "issues": [{"description": "No hearing", "sourceQuote": "a", "quote": "b"}],
            "entities": [{"name": "J. Smith", "role": "Manager", "title": "Line manager"}],
            "policyReferences": [{"policy": "", "name": "Disciplinary Policy", "title": "Policy 4"}]
        });
        let result = normalize(&value, "d", IdStrategy::Random);

        assert_eq!(result.timeline.len(), 1);
        assert_eq!(result.timeline[0].description, "Manager issued a verbal warning");
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].source_quote, "a");
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].role, "Manager");
        // an empty canonical value gives way to the next spelling
        assert_eq!(result.policy_references[0].policy, "Disciplinary Policy");
    }

    #[test]
    fn test_unknown_enums_fall_back() {
        assert_eq!(Severity::parse_lenient("whatever"), Severity::Medium);
        assert_eq!(Severity::parse_lenient("CRITICAL"), Severity::Critical);
        assert_eq!(Sentiment::parse_lenient(""), Sentiment::Neutral);
    }

    #[test]
    fn test_fallback_carries_raw_text() {
        let result = AnalysisResult::fallback("  model said something  ");
        assert_eq!(result.summary, vec!["model said something".to_string()]);
        assert!(result.timeline.is_empty());
    }
}
