//! Configuration management
//!
//! Manages application configuration: API settings, retention and
//! practice tuning knobs. Stored as TOML in the platform config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chat-completions API settings
    #[serde(default)]
    pub llm: LlmConfig,
    /// Dialog log retention settings
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Practice/exercise tuning
    #[serde(default)]
    pub practice: PracticeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key is stored in the keyring, this is just a reference
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used for the role-play dialog itself
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Model used for hints, analysis and exercise generation
    #[serde(default = "default_helper_model")]
    pub helper_model: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_helper_model() -> String {
    "gpt-3.5-turbo".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            helper_model: default_helper_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// How many dialog transcript files to keep on disk
    #[serde(default = "default_keep_dialogs")]
    pub keep_dialogs: usize,
}

fn default_keep_dialogs() -> usize {
    3
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_dialogs: default_keep_dialogs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeConfig {
    /// Maximum profile entries picked per practice session
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Exercises generated per picked entry
    #[serde(default = "default_exercises_per_entry")]
    pub exercises_per_entry: usize,
}

fn default_max_entries() -> usize {
    5
}

fn default_exercises_per_entry() -> usize {
    3
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            exercises_per_entry: default_exercises_per_entry(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            retention: RetentionConfig::default(),
            practice: PracticeConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            let config: Config = toml::from_str(&contents)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "lingua-coach", "lingua-coach")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "lingua-coach", "lingua-coach")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retention.keep_dialogs, 3);
        assert_eq!(config.practice.max_entries, 5);
        assert_eq!(config.practice.exercises_per_entry, 3);
        assert_eq!(config.llm.chat_model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.retention.keep_dialogs, config.retention.keep_dialogs);
        assert_eq!(parsed.llm.base_url, config.llm.base_url);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[retention]\nkeep_dialogs = 7\n").unwrap();
        assert_eq!(parsed.retention.keep_dialogs, 7);
        assert_eq!(parsed.practice.max_entries, 5);
    }
}
