/// Typed results of the case-level operations.
///
/// Models answer these in loosely shaped JSON. Every field defaults to empty,
/// field names are matched against the spellings models actually use, list
/// items with nothing in them are dropped, and severities and priorities parse
/// leniently, so a partially recovered answer still yields a usable report.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analysis::{field, items, string_list, text_field, Severity};

/// A report read out of one JSON object.
pub trait Report: Default {
    fn read(obj: &Map<String, Value>) -> Self;
}

/// Findings across several document analyses.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossAnalysis {
    pub contradictions: Vec<Contradiction>,
    pub patterns: Vec<Pattern>,
    pub corroborations: Vec<Corroboration>,
    pub gaps: Vec<String>,
    pub overall_assessment: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contradiction {
    pub description: String,
    pub documents: Vec<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pattern {
    pub description: String,
    pub instances: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Corroboration {
    pub claim: String,
    pub evidence: Vec<String>,
}

/// Material for an appeal to the Employment Appeal Tribunal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppealPack {
    pub grounds: Vec<AppealGround>,
    pub chronology: Vec<ChronologyEntry>,
    pub evidence_index: Vec<EvidenceItem>,
    pub remedies: Vec<String>,
    pub cover_note: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppealGround {
    pub title: String,
    pub argument: String,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChronologyEntry {
    pub date: String,
    pub event: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvidenceItem {
    pub document: String,
    pub description: String,
    pub relevance: String,
}

/// Causes of action and the law behind them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegalFramework {
    pub claims: Vec<LegalClaim>,
    pub time_limits: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegalClaim {
    pub name: String,
    pub statute: String,
    pub elements: Vec<String>,
    pub evidence_for: Vec<String>,
    pub evidence_against: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionPlan {
    pub actions: Vec<ActionItem>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionItem {
    pub title: String,
    pub description: String,
    pub deadline: String,
    pub priority: Severity,
}

type Object = Map<String, Value>;

fn strings(obj: &Object, keys: &[&str]) -> Vec<String> {
    string_list(field(obj, keys))
}

fn severity(obj: &Object, keys: &[&str]) -> Severity {
    Severity::parse_lenient(&text_field(obj, keys))
}

/// Keep `item` only if `primary` has text.
fn kept<T>(item: T, primary: impl Fn(&T) -> &str) -> Option<T> {
    (!primary(&item).is_empty()).then_some(item)
}

impl Report for CrossAnalysis {
    fn read(obj: &Object) -> Self {
        CrossAnalysis {
            contradictions: items(field(obj, &["contradictions", "inconsistencies"]), |o| {
                kept(
                    Contradiction {
                        description: text_field(o, &["description", "detail"]),
                        documents: strings(o, &["documents", "sources", "sourceDocs"]),
                        severity: severity(o, &["severity"]),
                    },
                    |c| &c.description,
                )
            }),
            patterns: items(field(obj, &["patterns"]), |o| {
                kept(
                    Pattern {
                        description: text_field(o, &["description", "pattern", "detail"]),
                        instances: strings(o, &["instances", "examples", "occurrences"]),
                    },
                    |p| &p.description,
                )
            }),
            corroborations: items(field(obj, &["corroborations"]), |o| {
                kept(
                    Corroboration {
                        claim: text_field(o, &["claim", "fact", "description"]),
                        evidence: strings(o, &["evidence", "supportingEvidence", "sources"]),
                    },
                    |c| &c.claim,
                )
            }),
            gaps: strings(obj, &["gaps"]),
            overall_assessment: text_field(obj, &["overallAssessment", "overall_assessment", "assessment"]),
        }
    }
}

impl Report for AppealPack {
    fn read(obj: &Object) -> Self {
        AppealPack {
            grounds: items(field(obj, &["grounds"]), |o| {
                kept(
                    AppealGround {
                        title: text_field(o, &["title", "ground", "name"]),
                        argument: text_field(o, &["argument", "reasoning", "description"]),
                        evidence: strings(o, &["evidence", "supportingEvidence"]),
                    },
                    |g| &g.title,
                )
            }),
            chronology: items(field(obj, &["chronology"]), |o| {
                kept(
                    ChronologyEntry {
                        date: text_field(o, &["date", "when"]),
                        event: text_field(o, &["event", "description"]),
                        source: text_field(o, &["source", "sourceDoc", "document"]),
                    },
                    |c| &c.event,
                )
            }),
            evidence_index: items(field(obj, &["evidenceIndex", "evidence_index"]), |o| {
                kept(
                    EvidenceItem {
                        document: text_field(o, &["document", "fileName", "title"]),
                        description: text_field(o, &["description"]),
                        relevance: text_field(o, &["relevance"]),
                    },
                    |e| &e.document,
                )
            }),
            remedies: strings(obj, &["remedies"]),
            cover_note: text_field(obj, &["coverNote", "cover_note", "coverLetter"]),
        }
    }
}

impl Report for LegalFramework {
    fn read(obj: &Object) -> Self {
        LegalFramework {
            claims: items(field(obj, &["claims", "causesOfAction"]), |o| {
                kept(
                    LegalClaim {
                        name: text_field(o, &["name", "claim", "title"]),
                        statute: text_field(o, &["statute", "legislation", "law"]),
                        elements: strings(o, &["elements", "tests"]),
                        evidence_for: strings(o, &["evidenceFor", "supportingEvidence"]),
                        evidence_against: strings(o, &["evidenceAgainst", "weaknesses"]),
                    },
                    |c| &c.name,
                )
            }),
            time_limits: strings(obj, &["timeLimits", "time_limits", "deadlines"]),
            notes: strings(obj, &["notes"]),
        }
    }
}

impl Report for ActionPlan {
    fn read(obj: &Object) -> Self {
        ActionPlan {
            actions: items(field(obj, &["actions", "steps", "tasks"]), |o| {
                kept(
                    ActionItem {
                        title: text_field(o, &["title", "action", "task"]),
                        description: text_field(o, &["description", "detail"]),
                        deadline: text_field(o, &["deadline", "dueDate", "by"]),
                        priority: severity(o, &["priority", "urgency"]),
                    },
                    |a| &a.title,
                )
            }),
            summary: text_field(obj, &["summary", "overview"]),
        }
    }
}

/// Read a report out of a recovered value.
///
/// A bare array is taken as the report's primary list under `list_key`.
/// Anything else that isn't an object gives the empty report.
pub fn from_value<T: Report>(value: &Value, list_key: &str) -> T {
    match value {
        Value::Object(obj) => T::read(obj),
        Value::Array(_) => {
            let mut obj = Object::new();
            obj.insert(list_key.to_string(), value.clone());
            T::read(&obj)
        }
        _ => {
            tracing::debug!("Report answer was not an object, using empty report");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cross_analysis_lenient_fields() {
        let value = json!({
            "contradictions": [
                {"detail": "Dismissal letter cites lateness; rota shows on time", "sources": "rota.pdf", "severity": "HIGH"},
                "not an object"
            ],
            "patterns": [{"pattern": "Meetings called at short notice", "examples": ["2024-01-05", "2024-02-11"]}],
            "gaps": "No minutes for the grievance hearing",
            "overallAssessment": "Strong on procedure."
        });

        let report: CrossAnalysis = from_value(&value, "contradictions");
        assert_eq!(report.contradictions.len(), 1);
        assert_eq!(report.contradictions[0].severity, Severity::High);
        assert_eq!(report.contradictions[0].documents, vec!["rota.pdf"]);
        assert_eq!(report.patterns[0].instances.len(), 2);
        assert!(report.corroborations.is_empty());
        assert_eq!(report.gaps, vec!["No minutes for the grievance hearing"]);
        assert_eq!(report.overall_assessment, "Strong on procedure.");
    }

    #[test]
    fn test_truncated_appeal_pack_keeps_what_arrived() {
        let value = json!({"grounds": [{"ground": "Perversity", "reasoning": "No evidence for finding 12"}]});
        let pack: AppealPack = from_value(&value, "grounds");
        assert_eq!(pack.grounds[0].title, "Perversity");
        assert!(pack.chronology.is_empty());
        assert!(pack.cover_note.is_empty());
    }

    #[test]
    fn test_bare_array_becomes_primary_list() {
        let value = json!([{"action": "File ET1", "dueDate": "2024-04-04", "urgency": "critical"}]);
        let plan: ActionPlan = from_value(&value, "actions");
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].deadline, "2024-04-04");
        assert_eq!(plan.actions[0].priority, Severity::Critical);
    }

    #[test]
    fn test_alternate_spellings_alongside_canonical_names() {
        let value = json!({
            "grounds": [{"title": "Perversity", "ground": "Ground 1", "argument": "No evidence for finding 12"}],
            "chronology": [{"date": "2024-01-05", "event": "Dismissed", "description": "Summary dismissal"}],
            "coverNote": "Dear EAT",
            "coverLetter": "To whom it may concern"
        });
        let pack: AppealPack = from_value(&value, "grounds");
        assert_eq!(pack.grounds.len(), 1);
        assert_eq!(pack.grounds[0].title, "Perversity");
        assert_eq!(pack.chronology[0].event, "Dismissed");
        assert_eq!(pack.cover_note, "Dear EAT");

        let plan: ActionPlan = from_value(
            &json!({"actions": [{"title": "File ET1", "action": "Submit claim form", "priority": "high"}]}),
            "actions",
        );
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].title, "File ET1");
        assert_eq!(plan.actions[0].priority, Severity::High);
    }

    #[test]
    fn test_empty_items_dropped() {
        let value = json!({"contradictions": [{}, {"severity": "high"}, {"description": "Dates disagree"}]});
        let report: CrossAnalysis = from_value(&value, "contradictions");
        assert_eq!(report.contradictions.len(), 1);
        assert_eq!(report.contradictions[0].description, "Dates disagree");
    }

    #[test]
    fn test_scalar_gives_empty_report() {
        let framework: LegalFramework = from_value(&json!("nothing useful"), "claims");
        assert_eq!(framework, LegalFramework::default());
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let pack = AppealPack {
            cover_note: "Dear EAT".into(),
            ..AppealPack::default()
        };
        let json = serde_json::to_value(&pack).unwrap();
        assert_eq!(json["coverNote"], "Dear EAT");
        assert!(json["evidenceIndex"].as_array().unwrap().is_empty());
    }
}
