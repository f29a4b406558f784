//! Configuration management for GeminiBuddy
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.geminibuddy/config.toml

use crate::agent::DEFAULT_MAX_ITERATIONS;
use crate::errors::{AgentError, Result};
use crate::models::{is_valid_model, DEFAULT_API_BASE_URL, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT_SECS, VALID_MODELS};
use crate::tools::types::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_MAX_WRITE_BYTES};
use crate::tools::ToolContext;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on the per-message iteration cap
pub const MAX_ITERATIONS_LIMIT: usize = 100;

/// Complete configuration for GeminiBuddy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
    pub store: StoreConfig,
}

/// Gemini connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub default_model: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
}

/// Turn loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: usize,
}

/// Tool sandbox configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub sandbox_root: String,
    pub max_output_bytes: usize,
    pub max_write_bytes: usize,
}

/// Chat storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub chats_dir: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            sandbox_root: "code".to_string(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_write_bytes: DEFAULT_MAX_WRITE_BYTES,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chats_dir: "~/.geminibuddy/chats".to_string(),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used and created with defaults on first load.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(config_path) => Self::load_from_file(config_path),
            None => Self::load_default(),
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AgentError::ConfigError(format!("Failed to read config {}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from the standard location, writing defaults if it doesn't exist
    pub fn load_default() -> Result<Self> {
        let Some(config_path) = Self::default_path() else {
            return Ok(Config::default());
        };

        if config_path.exists() {
            return Self::load_from_file(&config_path);
        }

        let config = Config::default();
        config.save(&config_path)?;
        Ok(config)
    }

    /// Standard config location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".geminibuddy").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !is_valid_model(&self.model.default_model) {
            return Err(AgentError::ConfigError(format!(
                "Invalid model '{}'. Valid models: {}",
                self.model.default_model,
                VALID_MODELS.join(", ")
            )));
        }

        if self.model.request_timeout_secs == 0 {
            return Err(AgentError::ConfigError(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.agent.max_iterations == 0 || self.agent.max_iterations > MAX_ITERATIONS_LIMIT {
            return Err(AgentError::ConfigError(format!(
                "max_iterations must be between 1 and {}",
                MAX_ITERATIONS_LIMIT
            )));
        }

        if self.tools.sandbox_root.trim().is_empty() {
            return Err(AgentError::ConfigError("sandbox_root must not be empty".to_string()));
        }

        if self.tools.max_output_bytes == 0 || self.tools.max_write_bytes == 0 {
            return Err(AgentError::ConfigError(
                "max_output_bytes and max_write_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AgentError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AgentError::ConfigError(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AgentError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Sandbox root directory
    pub fn sandbox_root(&self) -> PathBuf {
        Self::expand_path(&self.tools.sandbox_root)
    }

    /// Chat storage directory
    pub fn chats_dir(&self) -> PathBuf {
        Self::expand_path(&self.store.chats_dir)
    }

    /// Model request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.model.request_timeout_secs)
    }

    /// Tool bounds
    pub fn tool_context(&self) -> ToolContext {
        ToolContext::default()
            .with_max_output_bytes(self.tools.max_output_bytes)
            .with_max_write_bytes(self.tools.max_write_bytes)
    }
}
