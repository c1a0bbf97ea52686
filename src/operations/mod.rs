/// Case-level operations
///
/// Everything beyond single-document analysis and chat: reasoning over a whole
/// case file. Each operation is one instruction plus the case input, answered
/// as JSON. These need a large cloud model; `dispatch` decides where they run.

pub mod reports;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::analysis::AnalysisResult;
use crate::errors::AssistError;

pub use reports::{
    ActionItem, ActionPlan, AppealGround, AppealPack, ChronologyEntry, Contradiction, Corroboration, CrossAnalysis,
    EvidenceItem, LegalClaim, LegalFramework, Pattern,
};

/// Cloud-only case operations, named in kebab-case on the command line and in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseOperation {
    ConsolidateIssues,
    ExtractLegalFramework,
    GenerateActionPlan,
    GenerateTribunalStrategy,
    DraftEt1Claim,
    DraftWitnessStatement,
    BuildChronology,
    AssessTimeLimits,
    IdentifyComparators,
    CalculateRemedy,
    DraftGrievanceLetter,
    DraftSubjectAccessRequest,
    PrepareCrossExamination,
    SummariseCase,
    AssessProtectedActs,
    MapEvidenceToClaims,
    DraftWithoutPrejudiceLetter,
    ReviewSettlementOffer,
    PrepareHearingBundle,
    GenerateListOfIssues,
}

impl CaseOperation {
    pub const ALL: [CaseOperation; 20] = [
        CaseOperation::ConsolidateIssues,
        CaseOperation::ExtractLegalFramework,
        CaseOperation::GenerateActionPlan,
        CaseOperation::GenerateTribunalStrategy,
        CaseOperation::DraftEt1Claim,
        CaseOperation::DraftWitnessStatement,
        CaseOperation::BuildChronology,
        CaseOperation::AssessTimeLimits,
        CaseOperation::IdentifyComparators,
        CaseOperation::CalculateRemedy,
        CaseOperation::DraftGrievanceLetter,
        CaseOperation::DraftSubjectAccessRequest,
        CaseOperation::PrepareCrossExamination,
        CaseOperation::SummariseCase,
        CaseOperation::AssessProtectedActs,
        CaseOperation::MapEvidenceToClaims,
        CaseOperation::DraftWithoutPrejudiceLetter,
        CaseOperation::ReviewSettlementOffer,
        CaseOperation::PrepareHearingBundle,
        CaseOperation::GenerateListOfIssues,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CaseOperation::ConsolidateIssues => "consolidate-issues",
            CaseOperation::ExtractLegalFramework => "extract-legal-framework",
            CaseOperation::GenerateActionPlan => "generate-action-plan",
            CaseOperation::GenerateTribunalStrategy => "generate-tribunal-strategy",
            CaseOperation::DraftEt1Claim => "draft-et1-claim",
            CaseOperation::DraftWitnessStatement => "draft-witness-statement",
            CaseOperation::BuildChronology => "build-chronology",
            CaseOperation::AssessTimeLimits => "assess-time-limits",
            CaseOperation::IdentifyComparators => "identify-comparators",
            CaseOperation::CalculateRemedy => "calculate-remedy",
            CaseOperation::DraftGrievanceLetter => "draft-grievance-letter",
            CaseOperation::DraftSubjectAccessRequest => "draft-subject-access-request",
            CaseOperation::PrepareCrossExamination => "prepare-cross-examination",
            CaseOperation::SummariseCase => "summarise-case",
            CaseOperation::AssessProtectedActs => "assess-protected-acts",
            CaseOperation::MapEvidenceToClaims => "map-evidence-to-claims",
            CaseOperation::DraftWithoutPrejudiceLetter => "draft-without-prejudice-letter",
            CaseOperation::ReviewSettlementOffer => "review-settlement-offer",
            CaseOperation::PrepareHearingBundle => "prepare-hearing-bundle",
            CaseOperation::GenerateListOfIssues => "generate-list-of-issues",
        }
    }

    /// What the model is asked to produce, including the JSON shape.
    pub fn instruction(self) -> &'static str {
        match self {
            CaseOperation::ConsolidateIssues => {
                "Merge the issues found across all documents into one deduplicated list. \
                 Keep the strongest verbatim quote for each. Return {\"issues\": [{\"category\", \"description\", \"sourceQuote\", \"severity\"}]}."
            }
            CaseOperation::ExtractLegalFramework => {
                "Identify each cause of action under UK employment law that the evidence supports, \
                 with the statute, the elements to prove, and evidence for and against. \
                 Return {\"claims\": [{\"name\", \"statute\", \"elements\": [], \"evidenceFor\": [], \"evidenceAgainst\": []}], \"timeLimits\": [], \"notes\": []}."
            }
            CaseOperation::GenerateActionPlan => {
                "Produce a prioritised list of next steps for the claimant, with deadlines where the law sets them. \
                 Return {\"summary\", \"actions\": [{\"title\", \"description\", \"deadline\", \"priority\"}]}."
            }
            CaseOperation::GenerateTribunalStrategy => {
                "Outline a strategy for the full hearing: strongest arguments, weaknesses to address, witnesses to call. \
                 Return {\"strengths\": [], \"weaknesses\": [], \"witnesses\": [], \"strategy\"}."
            }
            CaseOperation::DraftEt1Claim => {
                "Draft the particulars of claim for an ET1 form in numbered paragraphs. \
                 Return {\"claims\": [], \"particulars\": []}."
            }
            CaseOperation::DraftWitnessStatement => {
                "Draft the claimant's witness statement in the first person, chronological, numbered paragraphs, \
                 with bundle references in square brackets. Return {\"paragraphs\": []}."
            }
            CaseOperation::BuildChronology => {
                "Build a single agreed-style chronology of the case from every dated event. \
                 Return {\"chronology\": [{\"date\", \"event\", \"source\"}]}."
            }
            CaseOperation::AssessTimeLimits => {
                "Assess the primary time limit for each potential claim, ACAS early conciliation effects, \
                 and whether any claim is at risk of being out of time. Return {\"claims\": [{\"name\", \"deadline\", \"status\", \"reasoning\"}]}."
            }
            CaseOperation::IdentifyComparators => {
                "Identify actual or hypothetical comparators for any discrimination claims. \
                 Return {\"comparators\": [{\"name\", \"type\", \"treatment\", \"relevance\"}]}."
            }
            CaseOperation::CalculateRemedy => {
                "Estimate the heads of loss: basic award, compensatory award, injury to feelings band, \
                 with assumptions stated. Return {\"heads\": [{\"name\", \"amount\", \"basis\"}], \"assumptions\": []}."
            }
            CaseOperation::DraftGrievanceLetter => {
                "Draft a formal written grievance to the employer. Return {\"subject\", \"body\"}."
            }
            CaseOperation::DraftSubjectAccessRequest => {
                "Draft a subject access request under UK GDPR targeting the records relevant to this case. \
                 Return {\"subject\", \"body\", \"categories\": []}."
            }
            CaseOperation::PrepareCrossExamination => {
                "Prepare cross-examination questions for each respondent witness, each tied to a document. \
                 Return {\"witnesses\": [{\"name\", \"questions\": [{\"question\", \"purpose\", \"document\"}]}]}."
            }
            CaseOperation::SummariseCase => {
                "Summarise the case for a reader new to it in under 400 words. Return {\"summary\", \"keyPoints\": []}."
            }
            CaseOperation::AssessProtectedActs => {
                "Identify any protected acts (victimisation) or protected disclosures (whistleblowing) and the \
                 detriments that followed. Return {\"acts\": [{\"date\", \"description\", \"type\", \"detriments\": []}]}."
            }
            CaseOperation::MapEvidenceToClaims => {
                "Map each piece of evidence to the claims it supports or undermines. \
                 Return {\"mappings\": [{\"claim\", \"supporting\": [], \"undermining\": []}]}."
            }
            CaseOperation::DraftWithoutPrejudiceLetter => {
                "Draft a without prejudice settlement proposal letter to the respondent. Return {\"subject\", \"body\"}."
            }
            CaseOperation::ReviewSettlementOffer => {
                "Review the settlement offer described in the notes against the likely tribunal outcome. \
                 Return {\"assessment\", \"risks\": [], \"counterProposal\"}."
            }
            CaseOperation::PrepareHearingBundle => {
                "Propose the hearing bundle index in chronological order with page estimates. \
                 Return {\"sections\": [{\"title\", \"documents\": [{\"name\", \"date\", \"pages\"}]}]}."
            }
            CaseOperation::GenerateListOfIssues => {
                "Draft the list of issues for the tribunal to decide, grouped by claim. \
                 Return {\"issues\": [{\"claim\", \"questions\": []}]}."
            }
        }
    }
}

impl fmt::Display for CaseOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        CaseOperation::ALL
            .into_iter()
            .find(|op| op.as_str() == wanted)
            .ok_or_else(|| format!("Unknown case operation: {}", s.trim()))
    }
}

/// Everything a case-level operation is given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseInput {
    pub case_summary: String,
    pub analyses: Vec<AnalysisResult>,
    pub notes: Option<String>,
}

impl CaseInput {
    /// Case material as prompt text. Empty sections are left out.
    pub fn render(&self) -> Result<String, AssistError> {
        let mut sections = Vec::new();
        if !self.case_summary.trim().is_empty() {
            sections.push(format!("Case summary:\n{}", self.case_summary.trim()));
        }
        if !self.analyses.is_empty() {
            sections.push(format!("Document analyses:\n{}", serde_json::to_string(&self.analyses)?));
        }
        if let Some(notes) = self.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            sections.push(format!("Claimant notes:\n{}", notes.trim()));
        }
        Ok(sections.join("\n\n"))
    }
}

pub const CASE_SYSTEM: &str = "You are assisting a litigant in person with a UK employment tribunal claim. \
     Work only from the material supplied and cite the source document for every factual statement. \
     You do not give legal advice. Output only JSON.";

pub const CROSS_ANALYSIS_INSTRUCTION: &str = "Compare the document analyses below against each other. \
     Find contradictions between documents, recurring patterns of treatment, facts corroborated by more than one \
     source, and gaps in the evidence. Return {\"contradictions\": [{\"description\", \"documents\": [], \"severity\"}], \
     \"patterns\": [{\"description\", \"instances\": []}], \"corroborations\": [{\"claim\", \"evidence\": []}], \
     \"gaps\": [], \"overallAssessment\"}.";

pub const APPEAL_PACK_INSTRUCTION: &str = "Prepare an appeal pack for the Employment Appeal Tribunal. \
     Appeals lie on points of law only: identify errors of law or perversity in the tribunal's decision. \
     Return {\"grounds\": [{\"title\", \"argument\", \"evidence\": []}], \"chronology\": [{\"date\", \"event\", \"source\"}], \
     \"evidenceIndex\": [{\"document\", \"description\", \"relevance\"}], \"remedies\": [], \"coverNote\"}.";

pub fn build_case_prompt(operation: CaseOperation, input: &CaseInput) -> Result<String, AssistError> {
    Ok(format!("{}\n\n{}", operation.instruction(), input.render()?))
}

pub fn build_cross_analysis_prompt(analyses: &[AnalysisResult]) -> Result<String, AssistError> {
    Ok(format!(
        "{}\n\nDocument analyses:\n{}",
        CROSS_ANALYSIS_INSTRUCTION,
        serde_json::to_string(analyses)?
    ))
}

pub fn build_appeal_pack_prompt(input: &CaseInput) -> Result<String, AssistError> {
    Ok(format!("{}\n\n{}", APPEAL_PACK_INSTRUCTION, input.render()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_from_str() {
        for op in CaseOperation::ALL {
            assert_eq!(op.as_str().parse::<CaseOperation>().unwrap(), op);
            let json = serde_json::to_value(op).unwrap();
            assert_eq!(json, op.as_str());
        }
    }

    #[test]
    fn test_from_str_tolerates_case_and_underscores() {
        assert_eq!("Draft_ET1_Claim".parse::<CaseOperation>().unwrap(), CaseOperation::DraftEt1Claim);
        assert!("draft-et2-claim".parse::<CaseOperation>().is_err());
    }

    #[test]
    fn test_render_skips_empty_sections() {
        let input = CaseInput {
            case_summary: "Dismissed after raising a grievance.".into(),
            analyses: Vec::new(),
            notes: Some("   ".into()),
        };
        assert_eq!(input.render().unwrap(), "Case summary:\nDismissed after raising a grievance.");
    }

    #[test]
    fn test_case_prompt_carries_instruction_and_analyses() {
        let input = CaseInput {
            analyses: vec![AnalysisResult {
                summary: vec!["Warning letter".into()],
                ..AnalysisResult::default()
            }],
            ..CaseInput::default()
        };
        let prompt = build_case_prompt(CaseOperation::BuildChronology, &input).unwrap();
        assert!(prompt.starts_with(CaseOperation::BuildChronology.instruction()));
        assert!(prompt.contains("\"summary\":[\"Warning letter\"]"));
    }
}
