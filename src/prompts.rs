// Prompt builders shared by every backend.
//
// Only the output contract matters to the rest of the crate: each analysis
// prompt asks for a single JSON object whose field names `analysis::normalize`
// understands.

/// Output contract for document analysis, embedded in every analysis prompt.
pub const ANALYSIS_SCHEMA: &str = r#"{
  "summary": ["string"],
  "chapters": [{"title": "string", "summary": "string", "pageEstimate": "string"}],
  "keyFindings": ["string"],
  "timeline": [{"date": "YYYY-MM-DD", "description": "string", "quote": "verbatim text", "severity": "Low|Medium|High|Critical", "category": "string"}],
  "issues": [{"category": "string", "description": "string", "sourceQuote": "verbatim text", "severity": "Low|Medium|High|Critical"}],
  "entities": [{"name": "string", "role": "string", "sentiment": "Positive|Neutral|Negative|Hostile"}],
  "medicalEvidence": [{"date": "string", "condition": "string", "description": "string", "quote": "verbatim text"}],
  "policyReferences": [{"policy": "string", "section": "string", "relevance": "string", "quote": "verbatim text"}]
}"#;

pub const ANALYSIS_SYSTEM: &str = "You are assisting a claimant preparing a UK employment tribunal case. \
     Extract evidence from the document faithfully. Quote the document verbatim where a quote is requested. \
     Never invent dates, names or events. Output only JSON.";

/// Smaller instruction for local models, which follow long prompts poorly.
pub const LOCAL_ANALYSIS_SYSTEM: &str = "Extract dated events, issues and people from the document. \
     Output only one JSON object. Keep every string short.";

pub const CHAT_SYSTEM: &str = "You are a careful assistant helping a claimant understand the evidence in their \
     UK employment tribunal case. Answer from the case context supplied. If the context does not cover the \
     question, say so. You do not give legal advice.";

pub fn build_analysis_prompt(file_name: &str, text: &str) -> String {
    format!(
        "Analyse the document \"{file_name}\" and return JSON with exactly this shape:\n\
         {ANALYSIS_SCHEMA}\n\
         Use empty lists for anything the document does not contain.\n\n\
         Document:\n{text}"
    )
}

/// Prompt for providers that receive the document as an attachment instead of text.
pub fn build_attachment_analysis_prompt(file_name: &str) -> String {
    format!(
        "Read the attached document \"{file_name}\" (transcribe it first if it is a scan or photo) \
         and return JSON with exactly this shape:\n\
         {ANALYSIS_SCHEMA}\n\
         Use empty lists for anything the document does not contain."
    )
}

pub fn build_local_analysis_prompt(file_name: &str, text: &str) -> String {
    format!(
        "Document \"{file_name}\":\n{text}\n\n\
         Return JSON: {{\"summary\": [\"...\"], \"timeline\": [{{\"date\": \"YYYY-MM-DD\", \"description\": \"...\", \
         \"quote\": \"...\", \"severity\": \"Low|Medium|High|Critical\", \"category\": \"...\"}}], \
         \"issues\": [{{\"category\": \"...\", \"description\": \"...\", \"sourceQuote\": \"...\", \"severity\": \"...\"}}], \
         \"entities\": [{{\"name\": \"...\", \"role\": \"...\", \"sentiment\": \"...\"}}]}}"
    )
}

/// Chat system instruction with the case context appended.
pub fn build_chat_system(context: &str) -> String {
    if context.trim().is_empty() {
        CHAT_SYSTEM.to_string()
    } else {
        format!("{CHAT_SYSTEM}\n\nCase context:\n{context}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_prompt_embeds_schema_and_text() {
        let prompt = build_analysis_prompt("et1.txt", "The claimant was dismissed.");
        assert!(prompt.contains("\"timeline\""));
        assert!(prompt.contains("et1.txt"));
        assert!(prompt.ends_with("The claimant was dismissed."));
    }

    #[test]
    fn test_chat_system_without_context() {
        assert_eq!(build_chat_system("   "), CHAT_SYSTEM);
        assert!(build_chat_system("Dismissed 2024").contains("Case context:\nDismissed 2024"));
    }
}
