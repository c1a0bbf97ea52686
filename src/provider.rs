/// Provider selection and the source it is read from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

/// The backend that answers analysis and chat requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSelection {
    /// Cloud-primary. The only backend with native multimodal ingestion.
    #[default]
    Gemini,
    /// Cloud-secondary, text only.
    Groq,
    /// Local in-process model.
    #[serde(rename = "webllm")]
    WebLlm,
}

impl ProviderSelection {
    pub fn is_local(self) -> bool {
        matches!(self, ProviderSelection::WebLlm)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderSelection::Gemini => "gemini",
            ProviderSelection::Groq => "groq",
            ProviderSelection::WebLlm => "webllm",
        }
    }

    /// Tolerant parse for persisted values: absent or unrecognized falls back to Gemini.
    pub fn from_persisted(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for ProviderSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderSelection::Gemini),
            "groq" => Ok(ProviderSelection::Groq),
            "webllm" | "local" => Ok(ProviderSelection::WebLlm),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// Where the dispatch layer reads the active provider from.
///
/// Read once at the start of every dispatched call. Implementations must not
/// cache across calls: a change made between two calls applies to the second.
pub trait SelectionSource: Send + Sync {
    fn current(&self) -> ProviderSelection;
}

/// In-memory selection, settable at runtime.
#[derive(Debug, Default)]
pub struct StaticSelection {
    value: RwLock<ProviderSelection>,
}

impl StaticSelection {
    pub fn new(value: ProviderSelection) -> Self {
        StaticSelection {
            value: RwLock::new(value),
        }
    }

    pub fn set(&self, value: ProviderSelection) {
        match self.value.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}

impl SelectionSource for StaticSelection {
    fn current(&self) -> ProviderSelection {
        match self.value.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_values_round_trip() {
        for p in [ProviderSelection::Gemini, ProviderSelection::Groq, ProviderSelection::WebLlm] {
            assert_eq!(p.as_str().parse::<ProviderSelection>().unwrap(), p);
        }
    }

    #[test]
    fn test_unrecognized_defaults_to_gemini() {
        assert_eq!(ProviderSelection::from_persisted(None), ProviderSelection::Gemini);
        assert_eq!(ProviderSelection::from_persisted(Some("claude")), ProviderSelection::Gemini);
        assert_eq!(ProviderSelection::from_persisted(Some(" WebLLM ")), ProviderSelection::WebLlm);
    }

    #[test]
    fn test_serde_uses_persisted_names() {
        let json = serde_json::to_string(&ProviderSelection::WebLlm).unwrap();
        assert_eq!(json, "\"webllm\"");
    }

    #[test]
    fn test_static_selection_change_is_visible() {
        let source = StaticSelection::new(ProviderSelection::Groq);
        assert_eq!(source.current(), ProviderSelection::Groq);
        source.set(ProviderSelection::WebLlm);
        assert_eq!(source.current(), ProviderSelection::WebLlm);
    }
}
