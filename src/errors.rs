/// Error taxonomy shared by every backend and the dispatch layer
///
/// Messages are written for the person at the keyboard: they say what was missing
/// or unavailable and, where it helps, which provider to switch to.

use crate::provider::ProviderSelection;

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    /// Missing credential or an input shape the selected provider cannot take.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The operation is defined as unavailable on the active provider.
    #[error("{operation} is not available with the {provider} provider (requires {capability}). Switch to a cloud provider in settings")]
    CapabilityUnsupported {
        operation: String,
        provider: ProviderSelection,
        capability: String,
    },

    /// Remote service failure, or a response nothing usable could be recovered from.
    #[error("{provider} error{}: {message}", .status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    Provider {
        provider: ProviderSelection,
        status: Option<u16>,
        message: String,
    },

    /// The local model could not be loaded.
    #[error("Local model failed to initialize: {0}")]
    RuntimeInitialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AssistError {
    /// Helper for capability errors
    ///
    /// Example:
    /// ```
    /// use tribunal_assist::errors::AssistError;
    /// use tribunal_assist::provider::ProviderSelection;
    /// let err = AssistError::unsupported("deep cross-analysis", ProviderSelection::WebLlm, "cloud reasoning");
    /// assert!(err.is_capability_unsupported());
    /// ```
    pub fn unsupported(operation: &str, provider: ProviderSelection, capability: &str) -> Self {
        AssistError::CapabilityUnsupported {
            operation: operation.to_string(),
            provider,
            capability: capability.to_string(),
        }
    }

    pub fn provider(provider: ProviderSelection, status: Option<u16>, message: impl Into<String>) -> Self {
        AssistError::Provider {
            provider,
            status,
            message: message.into(),
        }
    }

    pub fn is_capability_unsupported(&self) -> bool {
        matches!(self, AssistError::CapabilityUnsupported { .. })
    }

    pub fn is_runtime_initialization(&self) -> bool {
        matches!(self, AssistError::RuntimeInitialization(_))
    }
}

impl From<serde_json::Error> for AssistError {
    fn from(e: serde_json::Error) -> Self {
        AssistError::Internal(e.to_string())
    }
}
