/// Persisted user settings.
///
/// A flat JSON object of string values in the user's config directory. It holds
/// the provider selection (`ai_provider`) and API keys entered by the user. The
/// file is re-read on every access so a change made by another process applies
/// to the next dispatched call.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::errors::AssistError;
use crate::provider::{ProviderSelection, SelectionSource};

pub const PROVIDER_KEY: &str = "ai_provider";

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        SettingsStore { path: path.into() }
    }

    /// Store at the configured path, else `<config dir>/tribunal-assist/settings.json`.
    pub fn from_config(config: &Config) -> Result<Self, AssistError> {
        match &config.settings_path {
            Some(path) => Ok(Self::open(path)),
            None => Ok(Self::open(Self::default_path()?)),
        }
    }

    pub fn default_path() -> Result<PathBuf, AssistError> {
        dirs::config_dir()
            .map(|dir| dir.join("tribunal-assist").join("settings.json"))
            .ok_or_else(|| AssistError::Configuration("No user config directory on this platform; set settings_path".into()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, AssistError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let json = std::fs::read_to_string(&self.path)
            .map_err(|e| AssistError::Internal(format!("Failed to read {}: {}", self.path.display(), e)))?;
        if json.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&json).map_err(|e| {
            AssistError::Configuration(format!("Settings file {} is not valid: {}", self.path.display(), e))
        })
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), AssistError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| AssistError::Internal(format!("Failed to create {}: {}", dir.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(values)?;
        // Write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| AssistError::Internal(format!("Failed to write {}: {}", self.path.display(), e)))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, AssistError> {
        Ok(self.load()?.remove(key))
    }

    /// Set `key`. An empty value removes it.
    pub fn set(&self, key: &str, value: &str) -> Result<(), AssistError> {
        let mut values = self.load()?;
        if value.trim().is_empty() {
            values.remove(key);
        } else {
            values.insert(key.to_string(), value.trim().to_string());
        }
        self.save(&values)
    }

    pub fn selection(&self) -> Result<ProviderSelection, AssistError> {
        Ok(ProviderSelection::from_persisted(self.get(PROVIDER_KEY)?.as_deref()))
    }

    pub fn set_selection(&self, provider: ProviderSelection) -> Result<(), AssistError> {
        tracing::info!(provider = %provider, "Provider selection changed");
        self.set(PROVIDER_KEY, provider.as_str())
    }

    /// Stored key for a cloud provider. The local provider takes none.
    pub fn api_key(&self, provider: ProviderSelection) -> Result<Option<String>, AssistError> {
        match api_key_name(provider) {
            Some(name) => self.get(name),
            None => Ok(None),
        }
    }

    pub fn set_api_key(&self, provider: ProviderSelection, key: &str) -> Result<(), AssistError> {
        let name = api_key_name(provider).ok_or_else(|| {
            AssistError::Configuration(format!("The {} provider does not use an API key", provider))
        })?;
        self.set(name, key)
    }

    /// Switch back to the default cloud provider after the local model failed to load.
    pub fn revert_to_cloud(&self) -> Result<ProviderSelection, AssistError> {
        let provider = ProviderSelection::default();
        tracing::warn!(provider = %provider, "Reverting provider selection to cloud");
        self.set(PROVIDER_KEY, provider.as_str())?;
        Ok(provider)
    }
}

fn api_key_name(provider: ProviderSelection) -> Option<&'static str> {
    match provider {
        ProviderSelection::Gemini => Some("gemini_api_key"),
        ProviderSelection::Groq => Some("groq_api_key"),
        ProviderSelection::WebLlm => None,
    }
}

impl SelectionSource for SettingsStore {
    /// An unreadable file selects the default provider.
    fn current(&self) -> ProviderSelection {
        self.selection().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read provider selection, using default");
            ProviderSelection::default()
        })
    }
}
