/// Provider dispatch
///
/// The one surface callers use. Each call reads the provider selection exactly
/// once, refuses operations the selected provider cannot do before touching
/// any backend, and routes the rest to the local runtime or a cloud adapter.
/// Case-level operations are the exception: they always run on Gemini.

use futures::stream;
use serde_json::Value;
use std::sync::Arc;

use crate::analysis::{normalize, AnalysisResult, IdStrategy, Issue};
use crate::cloud::gemini::GeminiAdapter;
use crate::cloud::groq::GroqAdapter;
use crate::cloud::{collect_stream, CloudModel, TokenStream};
use crate::config::Config;
use crate::errors::AssistError;
use crate::local::LocalRuntime;
use crate::operations::{
    build_appeal_pack_prompt, build_case_prompt, build_cross_analysis_prompt, reports, ActionPlan, AppealPack,
    CaseInput, CaseOperation, CrossAnalysis, LegalFramework, CASE_SYSTEM,
};
use crate::prompts::build_chat_system;
use crate::provider::{ProviderSelection, SelectionSource};
use crate::recovery::recover;
use crate::types::{ChatMessage, DocumentContent, ProgressSink};

/// Source document stamped on consolidated issues, which span the whole case.
pub const CONSOLIDATED_SOURCE: &str = "consolidated";

/// Routed operations, for capability gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AnalyzeDocument,
    Chat,
    DeepCrossAnalysis,
    AppealPack,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::AnalyzeDocument => "Document analysis",
            Operation::Chat => "Chat",
            Operation::DeepCrossAnalysis => "Deep cross-analysis",
            Operation::AppealPack => "Appeal pack generation",
        }
    }

    /// Capability table. The local model is too small for whole-case reasoning.
    pub fn is_supported_on(self, provider: ProviderSelection) -> bool {
        !matches!(
            (self, provider),
            (Operation::DeepCrossAnalysis | Operation::AppealPack, ProviderSelection::WebLlm)
        )
    }
}

enum Backend<'a> {
    Local(&'a LocalRuntime),
    Cloud(&'a dyn CloudModel),
}

pub struct ProviderDispatch {
    selection: Arc<dyn SelectionSource>,
    gemini: Arc<dyn CloudModel>,
    groq: Arc<dyn CloudModel>,
    local: Arc<LocalRuntime>,
}

impl ProviderDispatch {
    pub fn new(
        selection: Arc<dyn SelectionSource>,
        gemini: Arc<dyn CloudModel>,
        groq: Arc<dyn CloudModel>,
        local: Arc<LocalRuntime>,
    ) -> Self {
        ProviderDispatch {
            selection,
            gemini,
            groq,
            local,
        }
    }

    /// Production wiring: both cloud adapters and the Ollama-backed local runtime.
    pub fn from_config(config: &Config, selection: Arc<dyn SelectionSource>) -> Self {
        Self::new(
            selection,
            Arc::new(GeminiAdapter::new(&config.gemini)),
            Arc::new(GroqAdapter::new(&config.groq)),
            Arc::new(LocalRuntime::from_config(&config.local)),
        )
    }

    pub fn selection(&self) -> ProviderSelection {
        self.selection.current()
    }

    pub fn local(&self) -> &LocalRuntime {
        &self.local
    }

    /// The cloud adapter for `provider`; `None` for the local provider.
    pub fn cloud_model(&self, provider: ProviderSelection) -> Option<&dyn CloudModel> {
        match provider {
            ProviderSelection::Gemini => Some(self.gemini.as_ref()),
            ProviderSelection::Groq => Some(self.groq.as_ref()),
            ProviderSelection::WebLlm => None,
        }
    }

    pub async fn validate_key(&self, provider: ProviderSelection, key: &str) -> bool {
        match self.cloud_model(provider) {
            Some(model) => model.validate_key(key).await,
            None => false,
        }
    }

    /// Read the selection once, gate, and pick the backend.
    fn route(&self, operation: Operation) -> Result<(ProviderSelection, Backend<'_>), AssistError> {
        let provider = self.selection.current();
        tracing::debug!(operation = operation.name(), provider = %provider, "Dispatching");

        if !operation.is_supported_on(provider) {
            return Err(AssistError::unsupported(operation.name(), provider, "a cloud provider"));
        }

        let backend = match self.cloud_model(provider) {
            Some(model) => Backend::Cloud(model),
            None => Backend::Local(&self.local),
        };
        Ok((provider, backend))
    }

    /// Route an operation that only a cloud adapter can serve.
    fn route_cloud(&self, operation: Operation) -> Result<(ProviderSelection, &dyn CloudModel), AssistError> {
        match self.route(operation)? {
            (provider, Backend::Cloud(model)) => Ok((provider, model)),
            (provider, Backend::Local(_)) => Err(AssistError::unsupported(operation.name(), provider, "a cloud provider")),
        }
    }

    /// Analyze one document with the selected provider.
    ///
    /// The local provider only takes extracted text: a scan or photo without
    /// text is refused rather than sent. `Ok(None)` means the local model
    /// answered but nothing structured could be recovered.
    pub async fn analyze_document(
        &self,
        content: &DocumentContent,
        file_name: &str,
        doc_id: &str,
        api_key: Option<&str>,
        progress: Option<&ProgressSink>,
    ) -> Result<Option<AnalysisResult>, AssistError> {
        match self.route(Operation::AnalyzeDocument)? {
            (provider, Backend::Local(local)) => match content.plain_text() {
                Some(text) => local.analyze_document(text, file_name, progress).await,
                None if content.has_encoded_bytes() => Err(AssistError::unsupported(
                    "Analysis of scanned or image documents",
                    provider,
                    "local OCR",
                )),
                None => Err(AssistError::Configuration(format!("{} has no content to analyse", file_name))),
            },
            (_, Backend::Cloud(model)) => model
                .analyze_document(content, file_name, doc_id, api_key)
                .await
                .map(Some),
        }
    }

    /// Chat turn, answered in full.
    pub async fn send_chat_message(
        &self,
        message: &str,
        context: &str,
        history: &[ChatMessage],
        api_key: Option<&str>,
        progress: Option<&ProgressSink>,
    ) -> Result<String, AssistError> {
        match self.route(Operation::Chat)? {
            (_, Backend::Local(local)) => local.chat(message, context, history, progress).await,
            (_, Backend::Cloud(model)) => {
                let tokens = model
                    .stream_chat(&build_chat_system(context), history, message, api_key)
                    .await?;
                collect_stream(tokens).await
            }
        }
    }

    /// Chat turn as a token stream. The local model answers in one piece.
    pub async fn stream_chat_message(
        &self,
        message: &str,
        context: &str,
        history: &[ChatMessage],
        api_key: Option<&str>,
        progress: Option<&ProgressSink>,
    ) -> Result<TokenStream, AssistError> {
        match self.route(Operation::Chat)? {
            (_, Backend::Local(local)) => {
                let answer = local.chat(message, context, history, progress).await?;
                let tokens: TokenStream = Box::pin(stream::iter(vec![Ok::<_, AssistError>(answer)]));
                Ok(tokens)
            }
            (_, Backend::Cloud(model)) => {
                model
                    .stream_chat(&build_chat_system(context), history, message, api_key)
                    .await
            }
        }
    }

    pub async fn deep_cross_analysis(
        &self,
        analyses: &[AnalysisResult],
        api_key: Option<&str>,
    ) -> Result<CrossAnalysis, AssistError> {
        let (provider, model) = self.route_cloud(Operation::DeepCrossAnalysis)?;
        if analyses.is_empty() {
            return Err(AssistError::Configuration("Cross-analysis needs at least one document analysis".into()));
        }

        tracing::info!(provider = %provider, documents = analyses.len(), "Running deep cross-analysis");
        let prompt = build_cross_analysis_prompt(analyses)?;
        let value = ask_json(model, &prompt, api_key).await?;
        Ok(reports::from_value(&value, "contradictions"))
    }

    pub async fn generate_appeal_pack(
        &self,
        request: &CaseInput,
        api_key: Option<&str>,
    ) -> Result<AppealPack, AssistError> {
        let (provider, model) = self.route_cloud(Operation::AppealPack)?;

        tracing::info!(provider = %provider, documents = request.analyses.len(), "Generating appeal pack");
        let prompt = build_appeal_pack_prompt(request)?;
        let value = ask_json(model, &prompt, api_key).await?;
        Ok(reports::from_value(&value, "grounds"))
    }

    /// Run a case-level operation. Always Gemini, whatever is selected.
    pub async fn run_case_operation(
        &self,
        operation: CaseOperation,
        input: &CaseInput,
        api_key: Option<&str>,
    ) -> Result<Value, AssistError> {
        tracing::info!(operation = %operation, "Running case operation");
        let prompt = build_case_prompt(operation, input)?;
        ask_json(self.gemini.as_ref(), &prompt, api_key).await
    }

    pub async fn consolidate_issues(&self, input: &CaseInput, api_key: Option<&str>) -> Result<Vec<Issue>, AssistError> {
        let value = self.run_case_operation(CaseOperation::ConsolidateIssues, input, api_key).await?;
        let value = match value {
            Value::Array(items) => serde_json::json!({ "issues": items }),
            other => other,
        };
        Ok(normalize(&value, CONSOLIDATED_SOURCE, IdStrategy::Positional { doc_id: CONSOLIDATED_SOURCE }).issues)
    }

    pub async fn extract_legal_framework(
        &self,
        input: &CaseInput,
        api_key: Option<&str>,
    ) -> Result<LegalFramework, AssistError> {
        let value = self.run_case_operation(CaseOperation::ExtractLegalFramework, input, api_key).await?;
        Ok(reports::from_value(&value, "claims"))
    }

    pub async fn generate_action_plan(&self, input: &CaseInput, api_key: Option<&str>) -> Result<ActionPlan, AssistError> {
        let value = self.run_case_operation(CaseOperation::GenerateActionPlan, input, api_key).await?;
        Ok(reports::from_value(&value, "actions"))
    }
}

/// One JSON answer from a cloud model. Nothing recoverable is a provider error.
async fn ask_json(model: &dyn CloudModel, prompt: &str, api_key: Option<&str>) -> Result<Value, AssistError> {
    let raw = model.complete(CASE_SYSTEM, prompt, api_key).await?;
    recover(&raw).ok_or_else(|| {
        tracing::warn!(provider = %model.provider(), response_len = raw.len(), "No structured result in response");
        AssistError::provider(model.provider(), None, "Response contained no usable structured result")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_table() {
        use ProviderSelection::*;

        let all = [
            Operation::AnalyzeDocument,
            Operation::Chat,
            Operation::DeepCrossAnalysis,
            Operation::AppealPack,
        ];
        for op in all {
            assert!(op.is_supported_on(Gemini));
            assert!(op.is_supported_on(Groq));
        }
        assert!(Operation::AnalyzeDocument.is_supported_on(WebLlm));
        assert!(Operation::Chat.is_supported_on(WebLlm));
        assert!(!Operation::DeepCrossAnalysis.is_supported_on(WebLlm));
        assert!(!Operation::AppealPack.is_supported_on(WebLlm));
    }
}
