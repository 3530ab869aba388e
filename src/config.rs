use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Storage key for the serialized `[flowId, ProgressRecord]` pairs
pub const DEFAULT_PROGRESS_KEY: &str = "onboarding_flow_progress";

/// Storage key for the serialized analytics log
pub const DEFAULT_ANALYTICS_KEY: &str = "onboarding_analytics";

fn default_storage_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("onboard-flow"))
        .unwrap_or_else(|| PathBuf::from("onboard-flow"))
}

/// Which durable key-value backend the store writes through to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// One JSON file per key under `storage_dir`
    File,
    /// Process-local map, lost on exit
    Memory,
    /// No backend: reads are empty and writes are skipped
    None,
}

/// What the controller does when a host-supplied hook returns an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPolicy {
    /// Return the hook's error to the caller of the triggering operation
    #[default]
    Propagate,
    /// Log the failure and carry on with the transition
    LogAndContinue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Durable storage backend for progress and analytics
    pub storage: StorageBackend,

    /// Directory holding one file per storage key (file backend only)
    pub storage_dir: PathBuf,

    /// Key for the progress records
    pub progress_key: String,

    /// Key for the analytics log
    pub analytics_key: String,

    /// Hook failure handling
    pub hook_policy: HookPolicy,

    /// Resume a flow at its stored step index instead of the first step
    pub resume_at_saved_step: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::File,
            storage_dir: default_storage_dir(),
            progress_key: DEFAULT_PROGRESS_KEY.to_string(),
            analytics_key: DEFAULT_ANALYTICS_KEY.to_string(),
            hook_policy: HookPolicy::Propagate,
            resume_at_saved_step: false,
        }
    }
}

impl EngineConfig {
    /// In-memory configuration, convenient for tests and ephemeral sessions
    pub fn in_memory() -> Self {
        Self {
            storage: StorageBackend::Memory,
            ..Self::default()
        }
    }

    /// Load configuration from `path`.
    /// Returns the defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;

        config.validate()?;
        tracing::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let save_err = |e: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| save_err(Box::new(e)))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| save_err(Box::new(e)))?;
        fs::write(path, json).map_err(|e| save_err(Box::new(e)))?;

        Ok(())
    }

    /// Default config file location in the platform config directory
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("onboard-flow").join("config.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_keys(&self.progress_key, &self.analytics_key)
    }
}

/// Both storage keys must be non-blank and distinct
pub(crate) fn validate_keys(progress_key: &str, analytics_key: &str) -> Result<(), ConfigError> {
    if progress_key.trim().is_empty() || analytics_key.trim().is_empty() {
        return Err(ConfigError::Invalid("storage keys must not be empty".to_string()));
    }
    if progress_key == analytics_key {
        return Err(ConfigError::Invalid(format!(
            "progress and analytics keys must differ (both {:?})",
            progress_key
        )));
    }
    Ok(())
}
