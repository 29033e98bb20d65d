// Application settings
// Loaded from ~/.config/tabsight/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Remote model provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIProvider {
    /// Remote interpretation disabled; keyword fallback only (default)
    #[default]
    None,
    /// OpenAI chat completions
    #[serde(rename = "openai")]
    OpenAI,
    /// Groq (OpenAI-compatible)
    Groq,
    /// Google Gemini via its OpenAI-compatible endpoint
    Gemini,
}

impl AIProvider {
    pub const ALL: [AIProvider; 4] = [AIProvider::None, AIProvider::OpenAI, AIProvider::Groq, AIProvider::Gemini];

    /// Returns true if remote calls are enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AIProvider::None)
    }

    /// Lowercase name, as written in settings.json
    pub fn name(&self) -> &'static str {
        match self {
            AIProvider::None => "none",
            AIProvider::OpenAI => "openai",
            AIProvider::Groq => "groq",
            AIProvider::Gemini => "gemini",
        }
    }

    /// Returns the default model for this provider
    pub fn default_model(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::OpenAI => "gpt-4",
            AIProvider::Groq => "llama3-70b-8192",
            AIProvider::Gemini => "gemini-1.5-flash",
        }
    }

    /// Base URL of the provider's OpenAI-compatible API
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::OpenAI => "https://api.openai.com/v1",
            AIProvider::Groq => "https://api.groq.com/openai/v1",
            AIProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    /// The provider's own conventional API key variable
    pub fn conventional_env_var(&self) -> Option<&'static str> {
        match self {
            AIProvider::None => None,
            AIProvider::OpenAI => Some("OPENAI_API_KEY"),
            AIProvider::Groq => Some("GROQ_API_KEY"),
            AIProvider::Gemini => Some("GEMINI_API_KEY"),
        }
    }
}

impl std::str::FromStr for AIProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AIProvider::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown provider '{}' (expected none, openai, groq or gemini)", s))
    }
}

/// Default request timeout for remote calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// AI-specific settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AISettings {
    /// Selected provider
    pub provider: AIProvider,

    /// Model identifier (provider-specific). Empty = provider default
    pub model: String,

    /// Override for the provider base URL (proxies, gateways)
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AISettings {
    fn default() -> Self {
        Self {
            provider: AIProvider::None,
            model: String::new(),
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AISettings {
    /// Get the effective model (user-specified or provider default)
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    /// Get the effective base URL (user-specified or provider default)
    pub fn effective_endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| self.provider.default_endpoint())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Cap on rows returned by a query; totalCount is unaffected. None = no cap
    #[serde(rename = "query.maxRows")]
    pub max_rows: Option<usize>,

    /// Pretty-print JSON output
    #[serde(rename = "output.pretty")]
    pub pretty: bool,

    // AI
    #[serde(rename = "ai", default)]
    pub ai: AISettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_rows: None,
            pretty: true,
            ai: AISettings::default(),
        }
    }
}

const DEFAULT_CONFIG: &str = r#"{
    // Query results
    // Cap returned rows (totalCount still counts every match); null = no cap
    "query.maxRows": null,

    // Output
    "output.pretty": true,

    // Remote interpretation (disabled by default)
    // Provider options: "none", "openai", "groq", "gemini"
    // API keys are read from TABSIGHT_<PROVIDER>_KEY or the provider's own
    // variable (OPENAI_API_KEY, ...), never from this file
    "ai": {
        "provider": "none",
        "model": "",
        "endpoint": null,
        "timeout_secs": 30
    }
}
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tabsight");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults.
    /// Writes a commented default file on first run.
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            create_default_file(&path);
            return Self::default();
        }

        Self::load_from(&path)
    }

    /// Load settings from `path`; any read or parse error yields defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("Error parsing {}: {}", path.display(), e);
                    eprintln!("Using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON, ignoring lines that start with `//`.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    /// Get the config file path for display
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

/// Create the default settings file with comments
fn create_default_file(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Error creating config directory: {}", e);
            return;
        }
    }

    if let Err(e) = fs::write(path, DEFAULT_CONFIG) {
        eprintln!("Error writing default settings.json: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_parses_to_defaults() {
        let parsed = Settings::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed = Settings::parse(
            r#"{
            // only the provider
            "ai": { "provider": "groq" }
        }"#,
        )
        .unwrap();
        assert_eq!(parsed.ai.provider, AIProvider::Groq);
        assert_eq!(parsed.ai.effective_model(), "llama3-70b-8192");
        assert_eq!(parsed.ai.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(parsed.pretty);
    }

    #[test]
    fn endpoint_override() {
        let mut ai = AISettings { provider: AIProvider::OpenAI, ..AISettings::default() };
        assert_eq!(ai.effective_endpoint(), "https://api.openai.com/v1");
        ai.endpoint = Some("http://localhost:8080/v1".to_string());
        assert_eq!(ai.effective_endpoint(), "http://localhost:8080/v1");
        ai.model = "gpt-4o-mini".to_string();
        assert_eq!(ai.effective_model(), "gpt-4o-mini");
    }

    #[test]
    fn provider_from_str() {
        assert_eq!("OpenAI".parse::<AIProvider>(), Ok(AIProvider::OpenAI));
        assert_eq!(" gemini ".parse::<AIProvider>(), Ok(AIProvider::Gemini));
        assert!("anthropic".parse::<AIProvider>().is_err());
    }

    #[test]
    fn load_from_bad_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());

        fs::write(&path, r#"{"query.maxRows": 100}"#).unwrap();
        assert_eq!(Settings::load_from(&path).max_rows, Some(100));
    }
}
