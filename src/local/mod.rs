/// Local model runtime
///
/// `LocalRuntime` owns the one loaded local model for the lifetime of the
/// process. Loading is lazy and single-flight: the first caller starts it,
/// concurrent callers wait on the same load, and later callers get the cached
/// handle straight away. A failed load caches nothing, so the next call retries.
///
/// The model is loaded by a `ModelLoader` and driven through a `LocalEngine`;
/// `ollama` provides both for an Ollama-hosted model.

pub mod ollama;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::analysis::{normalize, AnalysisResult, IdStrategy};
use crate::config::LocalConfig;
use crate::errors::AssistError;
use crate::prompts::{build_chat_system, build_local_analysis_prompt, LOCAL_ANALYSIS_SYSTEM};
use crate::recovery::recover;
use crate::types::{report, truncate_chars, ChatMessage, ProgressSink};

/// Appended to documents cut down to the local context budget.
pub const TRUNCATION_MARKER: &str = "\n\n[... document truncated for local analysis ...]";

/// One chat-format message sent to the local engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineMessage {
    pub role: String,
    pub content: String,
}

impl EngineMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        EngineMessage {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// A loaded model that can answer chat-format prompts.
#[async_trait]
pub trait LocalEngine: Send + Sync {
    async fn complete(&self, messages: &[EngineMessage]) -> Result<String, AssistError>;

    fn model_name(&self) -> &str;
}

/// Performs the one-time, expensive model load.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load the model, reporting progress along the way.
    async fn load(&self, progress: Option<&ProgressSink>) -> Result<Arc<dyn LocalEngine>, AssistError>;
}

/// Input budgets for the local model's small context window.
#[derive(Debug, Clone, Copy)]
pub struct LocalLimits {
    pub max_document_chars: usize,
    pub chat_history_turns: usize,
    pub chat_context_chars: usize,
}

impl From<&LocalConfig> for LocalLimits {
    fn from(config: &LocalConfig) -> Self {
        LocalLimits {
            max_document_chars: config.max_document_chars,
            chat_history_turns: config.chat_history_turns,
            chat_context_chars: config.chat_context_chars,
        }
    }
}

impl Default for LocalLimits {
    fn default() -> Self {
        LocalLimits::from(&LocalConfig::default())
    }
}

pub struct LocalRuntime {
    loader: Arc<dyn ModelLoader>,
    handle: OnceCell<Arc<dyn LocalEngine>>,
    limits: LocalLimits,
}

impl LocalRuntime {
    pub fn new(loader: Arc<dyn ModelLoader>, limits: LocalLimits) -> Self {
        LocalRuntime {
            loader,
            handle: OnceCell::new(),
            limits,
        }
    }

    /// Runtime backed by the Ollama loader described in `config`.
    pub fn from_config(config: &LocalConfig) -> Self {
        Self::new(Arc::new(ollama::OllamaLoader::new(config)), LocalLimits::from(config))
    }

    pub fn is_ready(&self) -> bool {
        self.handle.initialized()
    }

    pub fn limits(&self) -> LocalLimits {
        self.limits
    }

    /// Return the loaded engine, loading it first if needed.
    ///
    /// Progress is only reported by the caller that actually starts the load;
    /// callers that join an in-flight load, or find it already done, see none.
    pub async fn ensure_ready(&self, progress: Option<&ProgressSink>) -> Result<Arc<dyn LocalEngine>, AssistError> {
        if let Some(engine) = self.handle.get() {
            return Ok(engine.clone());
        }

        let engine = self
            .handle
            .get_or_try_init(|| async {
                tracing::info!("Initializing local model runtime");
                report(progress, 0.0, "Starting local model");
                let engine = self.loader.load(progress).await.map_err(|e| match e {
                    AssistError::RuntimeInitialization(_) => e,
                    other => AssistError::RuntimeInitialization(other.to_string()),
                })?;
                report(progress, 1.0, "Local model ready");
                tracing::info!(model = engine.model_name(), "Local model runtime ready");
                Ok::<_, AssistError>(engine)
            })
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Local model initialization failed"))?;

        Ok(engine.clone())
    }

    /// Single-turn generation.
    pub async fn generate(
        &self,
        prompt: &str,
        system: &str,
        progress: Option<&ProgressSink>,
    ) -> Result<String, AssistError> {
        let mut messages = Vec::with_capacity(2);
        if !system.trim().is_empty() {
            messages.push(EngineMessage::new("system", system));
        }
        messages.push(EngineMessage::new("user", prompt));
        self.run(&messages, progress).await
    }

    /// Analyze plain text. `Ok(None)` means the model produced nothing usable.
    pub async fn analyze_document(
        &self,
        text: &str,
        file_name: &str,
        progress: Option<&ProgressSink>,
    ) -> Result<Option<AnalysisResult>, AssistError> {
        let (kept, truncated) = truncate_chars(text, self.limits.max_document_chars);
        let body = if truncated {
            tracing::warn!(
                file_name,
                original_chars = text.chars().count(),
                truncated_to = self.limits.max_document_chars,
                "Document truncated for local analysis"
            );
            format!("{}{}", kept, TRUNCATION_MARKER)
        } else {
            kept.to_string()
        };

        let prompt = build_local_analysis_prompt(file_name, &body);
        let raw = self.generate(&prompt, LOCAL_ANALYSIS_SYSTEM, progress).await?;

        match recover(&raw) {
            Some(value) => {
                let mut result = normalize(&value, file_name, IdStrategy::Random);
                result.truncated = truncated;
                tracing::debug!(file_name, items = result.item_count(), "Local analysis complete");
                Ok(Some(result))
            }
            None => {
                tracing::warn!(file_name, response_len = raw.len(), "Local model returned no usable structured result");
                Ok(None)
            }
        }
    }

    /// Chat turn. History and context are cut silently to the local budgets.
    pub async fn chat(
        &self,
        message: &str,
        context: &str,
        history: &[ChatMessage],
        progress: Option<&ProgressSink>,
    ) -> Result<String, AssistError> {
        let (context, _) = truncate_chars(context, self.limits.chat_context_chars);
        let recent = &history[history.len().saturating_sub(self.limits.chat_history_turns)..];

        let mut messages = Vec::with_capacity(recent.len() + 2);
        messages.push(EngineMessage::new("system", build_chat_system(context)));
        messages.extend(recent.iter().map(|m| EngineMessage::new(m.role.as_str(), m.content.clone())));
        messages.push(EngineMessage::new("user", message));

        self.run(&messages, progress).await
    }

    async fn run(&self, messages: &[EngineMessage], progress: Option<&ProgressSink>) -> Result<String, AssistError> {
        let engine = self.ensure_ready(progress).await?;
        report(progress, 0.0, "Generating response");
        let text = engine.complete(messages).await?;
        report(progress, 1.0, "Response complete");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Progress;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct EchoEngine {
        reply: String,
        seen: Mutex<Vec<Vec<EngineMessage>>>,
    }

    #[async_trait]
    impl LocalEngine for EchoEngine {
        async fn complete(&self, messages: &[EngineMessage]) -> Result<String, AssistError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    struct SlowLoader {
        loads: AtomicUsize,
        fail_first: bool,
        engine: Arc<EchoEngine>,
    }

    impl SlowLoader {
        fn new(reply: &str, fail_first: bool) -> Arc<Self> {
            Arc::new(SlowLoader {
                loads: AtomicUsize::new(0),
                fail_first,
                engine: Arc::new(EchoEngine {
                    reply: reply.to_string(),
                    seen: Mutex::new(Vec::new()),
                }),
            })
        }
    }

    #[async_trait]
    impl ModelLoader for SlowLoader {
        async fn load(&self, progress: Option<&ProgressSink>) -> Result<Arc<dyn LocalEngine>, AssistError> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            report(progress, 0.5, "loading weights");
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail_first && n == 0 {
                return Err(AssistError::RuntimeInitialization("no GPU adapter".into()));
            }
            Ok(self.engine.clone())
        }
    }

    fn runtime(loader: Arc<SlowLoader>) -> LocalRuntime {
        LocalRuntime::new(loader, LocalLimits::default())
    }

    fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<f32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: ProgressSink = {
            let seen = seen.clone();
            Arc::new(move |p: Progress| seen.lock().unwrap().push(p.fraction))
        };
        (sink, seen)
    }

    #[tokio::test]
    async fn test_concurrent_first_use_loads_once() {
        let loader = SlowLoader::new("ok", false);
        let rt = runtime(loader.clone());

        let (a, b) = tokio::join!(rt.ensure_ready(None), rt.ensure_ready(None));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert!(rt.is_ready());
    }

    #[tokio::test]
    async fn test_ready_handle_reused_without_progress() {
        let loader = SlowLoader::new("ok", false);
        let rt = runtime(loader.clone());

        let (sink, seen) = recording_sink();
        rt.ensure_ready(Some(&sink)).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0.0, 0.5, 1.0]);

        let (sink2, seen2) = recording_sink();
        rt.ensure_ready(Some(&sink2)).await.unwrap();
        assert!(seen2.lock().unwrap().is_empty());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let loader = SlowLoader::new("ok", true);
        let rt = runtime(loader.clone());

        let err = rt.ensure_ready(None).await.err().expect("first load fails");
        assert!(err.is_runtime_initialization());
        assert!(!rt.is_ready());

        rt.ensure_ready(None).await.expect("second load succeeds");
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_chat_bounds_history_and_context() {
        let loader = SlowLoader::new("answer", false);
        let rt = runtime(loader.clone());

        let history: Vec<ChatMessage> = (0..50)
            .map(|i| if i % 2 == 0 { ChatMessage::user(format!("q{}", i)) } else { ChatMessage::assistant(format!("a{}", i)) })
            .collect();
        let context = "x".repeat(10_000);

        let reply = rt.chat("latest", &context, &history, None).await.unwrap();
        assert_eq!(reply, "answer");

        let seen = loader.engine.seen.lock().unwrap();
        let sent = &seen[0];
        // system + 6 history turns + new message
        assert_eq!(sent.len(), 8);
        assert_eq!(sent[1].content, "q44");
        assert_eq!(sent[6].content, "a49");
        assert_eq!(sent[7].content, "latest");
        assert!(sent[0].content.ends_with(&"x".repeat(2000)));
        assert!(!sent[0].content.contains(&"x".repeat(2001)));
    }

    #[tokio::test]
    async fn test_long_document_truncated_with_marker() {
        let loader = SlowLoader::new(r#"{"summary": ["long"]}"#, false);
        let rt = runtime(loader.clone());
        let text = "a".repeat(7000);

        let result = rt.analyze_document(&text, "long.txt", None).await.unwrap().unwrap();
        assert!(result.truncated);

        let seen = loader.engine.seen.lock().unwrap();
        let prompt = &seen[0].last().unwrap().content;
        assert!(prompt.contains(TRUNCATION_MARKER));
        assert!(prompt.contains(&"a".repeat(6000)));
        assert!(!prompt.contains(&"a".repeat(6001)));
    }

    #[tokio::test]
    async fn test_unusable_output_is_none_not_error() {
        let loader = SlowLoader::new("Sorry, I cannot do that.", false);
        let rt = runtime(loader);
        let result = rt.analyze_document("short text", "a.txt", None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_truncated_output_recovered_and_stamped() {
        let loader = SlowLoader::new(
            "```json\n{\"timeline\": [{\"date\": \"2024-01-05\", \"description\": \"Verbal warning\", \"quote\": \"you are on thin ic",
            false,
        );
        let rt = runtime(loader);
        let result = rt.analyze_document("On 2024-01-05 ...", "notes.txt", None).await.unwrap().unwrap();
        assert_eq!(result.timeline.len(), 1);
        assert_eq!(result.timeline[0].date, "2024-01-05");
        assert_eq!(result.timeline[0].source_doc, "notes.txt");
        assert!(!result.timeline[0].id.is_empty());
        assert!(!result.truncated);
    }
}
