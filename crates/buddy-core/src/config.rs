// ABOUTME: Configuration loading and management for opco-buddy
// ABOUTME: Supports TOML config files with sensible defaults

use crate::error::{BuddyError, Result};
use crate::i18n::Language;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides `api.api_key`
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interface and answer language
    pub language: Language,
    /// Generative API settings
    pub api: ApiConfig,
    /// Durable chat storage
    pub storage: StorageConfig,
    /// Prompt size limits
    pub context: ContextConfig,
    /// Web search versus structured tools
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Model used for chat turns
    pub model: String,
    /// Model used by the infographic tool
    pub image_model: String,
    /// Base URL of the generative API
    pub base_url: String,
    /// API key (GEMINI_API_KEY takes precedence)
    pub api_key: Option<String>,
    /// Consume responses incrementally
    pub stream: bool,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-3-pro-preview".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
            stream: true,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the key-value slots
    pub path: Option<PathBuf>,
    /// Key of the chat snapshot slot
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            key: crate::persist::CHATS_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Characters kept from each extracted document
    pub max_document_chars: usize,
    /// Characters of each document placed in a prompt
    pub max_chars_per_document: usize,
    /// Documents used when nothing is focused (None = all)
    pub max_context_documents: Option<usize>,
    /// Earlier messages replayed for multi-turn coherence
    pub history_window: usize,
    /// Characters of the first user message used as the chat title
    pub title_max_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_document_chars: 100_000,
            max_chars_per_document: 50_000,
            max_context_documents: None,
            history_window: 12,
            title_max_chars: 40,
        }
    }
}

/// Mutually exclusive request modes: the API either gets the generation
/// tools or web search, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Tools,
    Web,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub mode: SearchMode,
}

impl Config {
    /// Get the XDG config directory for opco-buddy (~/.config/opco-buddy)
    pub fn config_dir() -> PathBuf {
        // Respect XDG_CONFIG_HOME if set, otherwise use ~/.config
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|p| p.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("."))
            })
            .join("opco-buddy")
    }

    /// Get the XDG data directory for opco-buddy (~/.local/share/opco-buddy)
    pub fn data_dir() -> PathBuf {
        std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|p| p.join(".local").join("share"))
                    .unwrap_or_else(|| PathBuf::from("."))
            })
            .join("opco-buddy")
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load config from XDG config directory
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BuddyError::Config(format!("Failed to read config from {}: {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            BuddyError::Config(format!("Failed to parse config from {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later at request time
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url).map_err(|e| {
            BuddyError::Config(format!("api.base_url '{}' is not a URL: {}", self.api.base_url, e))
        })?;
        if self.api.model.trim().is_empty() {
            return Err(BuddyError::Config("api.model must not be empty".to_string()));
        }
        if self.storage.key.trim().is_empty() {
            return Err(BuddyError::Config("storage.key must not be empty".to_string()));
        }
        if self.context.max_document_chars == 0 {
            return Err(BuddyError::Config(
                "context.max_document_chars must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// API key from the environment, then from the file
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api.api_key.clone())
    }

    /// Get the storage directory, using default if not configured
    pub fn storage_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("storage"))
    }

    /// Generate a default config file content
    pub fn default_toml() -> String {
        r#"# opco-buddy configuration
# Location: ~/.config/opco-buddy/config.toml

# Interface and answer language: "pt" or "en"
language = "pt"

[api]
# model = "gemini-3-pro-preview"
# image_model = "gemini-2.5-flash-image"
# base_url = "https://generativelanguage.googleapis.com/v1beta"
# api_key = "..."  # GEMINI_API_KEY takes precedence
stream = true
timeout_secs = 300

[storage]
# path = "~/.local/share/opco-buddy/storage"  # Default location
# key = "opco_buddy_chats"

[context]
# max_document_chars = 100000
# max_chars_per_document = 50000
# max_context_documents = 10
# history_window = 12
# title_max_chars = 40

[search]
# "tools" declares file/chart/infographic generation, "web" enables web search instead
mode = "tools"
"#
        .to_string()
    }

    /// Initialize config directory and create default config if needed
    pub fn init() -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_path();
        let data_dir = Self::data_dir();

        std::fs::create_dir_all(&config_dir).map_err(|e| {
            BuddyError::Config(format!(
                "Failed to create config dir {}: {}",
                config_dir.display(),
                e
            ))
        })?;
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            BuddyError::Config(format!(
                "Failed to create data dir {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        if !config_path.exists() {
            std::fs::write(&config_path, Self::default_toml()).map_err(|e| {
                BuddyError::Config(format!(
                    "Failed to write config {}: {}",
                    config_path.display(),
                    e
                ))
            })?;
        }

        Ok(config_path)
    }
}
