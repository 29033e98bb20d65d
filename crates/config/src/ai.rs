// AI configuration and secrets management
//
// API keys are looked up in:
// 1. System keychain (with the `keychain` feature)
// 2. TABSIGHT_<PROVIDER>_KEY
// 3. The provider's conventional variable (OPENAI_API_KEY, ...)
//
// Keys are NEVER stored in settings.json

use std::env;

use serde::Serialize;

use crate::settings::{AIProvider, AISettings};

/// Service name for keychain storage
#[cfg(feature = "keychain")]
const KEYCHAIN_SERVICE: &str = "tabsight";

/// Source of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// Key retrieved from system keychain
    Keychain,
    /// Key retrieved from environment variable
    Environment,
    /// No key found
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

/// Result of key lookup
#[derive(Debug, Clone, PartialEq)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
    /// Environment variable the key came from, if any
    pub variable: Option<String>,
}

impl KeyLookup {
    fn missing() -> Self {
        Self { key: None, source: KeySource::None, variable: None }
    }
}

/// Get the tabsight-specific environment variable name for a provider
pub fn env_var_name(provider: &str) -> String {
    format!("TABSIGHT_{}_KEY", provider.to_uppercase())
}

#[cfg(feature = "keychain")]
fn keychain_account(provider: &str) -> String {
    format!("ai/{}", provider.to_lowercase())
}

/// Key lookup against an arbitrary variable source.
pub fn lookup_key(provider: AIProvider, var: &dyn Fn(&str) -> Option<String>) -> KeyLookup {
    if !provider.is_enabled() {
        return KeyLookup::missing();
    }

    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider.name())) {
            if let Ok(key) = entry.get_password() {
                return KeyLookup { key: Some(key), source: KeySource::Keychain, variable: None };
            }
        }
    }

    let candidates = std::iter::once(env_var_name(provider.name()))
        .chain(provider.conventional_env_var().map(str::to_string));

    for name in candidates {
        if let Some(key) = var(&name).filter(|k| !k.trim().is_empty()) {
            return KeyLookup { key: Some(key), source: KeySource::Environment, variable: Some(name) };
        }
    }

    KeyLookup::missing()
}

/// Check if keychain support is available
pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keyring::Entry::new(KEYCHAIN_SERVICE, "test").is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}

// ============================================================================
// Resolved AI Configuration (single source of truth)
// ============================================================================

/// The effective AI configuration, fully resolved from all sources.
#[derive(Debug, Clone)]
pub struct ResolvedAIConfig {
    /// Effective provider
    pub provider: AIProvider,
    /// True when provider was `none` but OPENAI_API_KEY selected OpenAI
    pub auto_selected: bool,
    /// Effective model (resolved from settings or provider default)
    pub model: String,
    /// Effective base URL
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    /// API key (if available)
    pub api_key: Option<String>,
    /// Source of the API key
    pub key_source: KeySource,
    /// Overall status
    pub status: AIConfigStatus,
    /// Human-readable reason if not ready
    pub blocking_reason: Option<String>,
}

/// Status of the AI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AIConfigStatus {
    /// provider = none and no OPENAI_API_KEY
    Disabled,
    /// Provider selected and key present
    Ready,
    /// Provider is configured but API key is missing
    MissingKey,
}

impl AIConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Ready => "ready",
            Self::MissingKey => "missing_key",
        }
    }
}

impl ResolvedAIConfig {
    /// Resolve the effective AI configuration from settings and the
    /// process environment.
    pub fn from_settings(settings: &AISettings) -> Self {
        Self::resolve(settings, &|name| env::var(name).ok())
    }

    /// Resolve against an arbitrary variable source.
    pub fn resolve(settings: &AISettings, var: &dyn Fn(&str) -> Option<String>) -> Self {
        let openai_key_set = var("OPENAI_API_KEY").is_some_and(|k| !k.trim().is_empty());
        let auto_selected = !settings.provider.is_enabled() && openai_key_set;
        let provider = if auto_selected { AIProvider::OpenAI } else { settings.provider };

        if !provider.is_enabled() {
            return Self {
                provider,
                auto_selected: false,
                model: String::new(),
                endpoint: None,
                timeout_secs: settings.timeout_secs,
                api_key: None,
                key_source: KeySource::None,
                status: AIConfigStatus::Disabled,
                blocking_reason: Some("provider=none".to_string()),
            };
        }

        let effective = AISettings { provider, ..settings.clone() };
        let lookup = lookup_key(provider, var);

        let (status, blocking_reason) = match lookup.key {
            Some(_) => (AIConfigStatus::Ready, None),
            None => (
                AIConfigStatus::MissingKey,
                Some(format!(
                    "No API key found. Set {}{}",
                    env_var_name(provider.name()),
                    provider
                        .conventional_env_var()
                        .map(|v| format!(" or {}", v))
                        .unwrap_or_default()
                )),
            ),
        };

        Self {
            provider,
            auto_selected,
            model: effective.effective_model().to_string(),
            endpoint: Some(effective.effective_endpoint().to_string()),
            timeout_secs: settings.timeout_secs,
            api_key: lookup.key,
            key_source: lookup.source,
            status,
            blocking_reason,
        }
    }

    /// Provider display name
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Confirms the configuration is usable. No network call.
    pub fn validate_config(&self) -> ValidationResult {
        match self.status {
            AIConfigStatus::Disabled => ValidationResult::Skipped("AI is disabled".to_string()),
            AIConfigStatus::MissingKey => ValidationResult::Invalid("No API key configured".to_string()),
            AIConfigStatus::Ready => {
                ValidationResult::Valid(format!("API key present ({})", self.key_source.as_str()))
            }
        }
    }
}

// ============================================================================
// Configuration Validation
// ============================================================================

/// Result of configuration validation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid(String),
    Invalid(String),
    /// Validation was skipped (AI disabled)
    Skipped(String),
}

impl ValidationResult {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Valid(msg) | Self::Invalid(msg) | Self::Skipped(msg) => msg,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

// ============================================================================
// Diagnostics (for CLI doctor and health)
// ============================================================================

/// Diagnostic information about AI configuration. Never carries the key.
#[derive(Debug, Clone, Serialize)]
pub struct AIDiagnostics {
    pub status: AIConfigStatus,
    pub blocking_reason: Option<String>,
    pub provider: String,
    pub auto_selected: bool,
    pub model: String,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub key_present: bool,
    pub key_source: KeySource,
    pub keychain_available: bool,
}

impl AIDiagnostics {
    pub fn from_resolved(config: &ResolvedAIConfig) -> Self {
        Self {
            status: config.status,
            blocking_reason: config.blocking_reason.clone(),
            provider: config.provider.name().to_string(),
            auto_selected: config.auto_selected,
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            timeout_secs: config.timeout_secs,
            key_present: config.api_key.is_some(),
            key_source: config.key_source,
            keychain_available: keychain_available(),
        }
    }
}

impl std::fmt::Display for AIDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "AI Configuration")?;
        writeln!(f, "──────────────────────────────")?;
        writeln!(f, "Status:            {}", self.status.as_str())?;
        if let Some(reason) = &self.blocking_reason {
            writeln!(f, "Blocking reason:   {}", reason)?;
        }
        writeln!(
            f,
            "Provider:          {}{}",
            self.provider,
            if self.auto_selected { " (selected by OPENAI_API_KEY)" } else { "" }
        )?;
        if !self.model.is_empty() {
            writeln!(f, "Model:             {}", self.model)?;
        }
        if let Some(endpoint) = &self.endpoint {
            writeln!(f, "Endpoint:          {}", endpoint)?;
        }
        writeln!(f, "Timeout:           {}s", self.timeout_secs)?;
        writeln!(f, "Key present:       {}", if self.key_present { "yes" } else { "no" })?;
        writeln!(f, "Key source:        {}", self.key_source.as_str())?;
        writeln!(f, "Keychain available:{}", if self.keychain_available { "yes" } else { "no" })?;
        Ok(())
    }
}
