use thiserror::Error;

/// Library errors using thiserror for structured error handling.
///
/// Missing flows, steps and progress records are never errors: the engine
/// treats them as no-ops. What remains are storage failures, configuration
/// failures and failures raised by host-supplied hooks.

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read stored key: {key}")]
    ReadFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write stored key: {key}")]
    WriteFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create storage directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode stored value")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No platform config directory available")]
    NoConfigDir,
}

/// Which host-supplied hook failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Enter,
    Exit,
    Complete,
    Skip,
    Action,
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HookKind::Enter => "on_enter",
            HookKind::Exit => "on_exit",
            HookKind::Complete => "on_complete",
            HookKind::Skip => "on_skip",
            HookKind::Action => "action",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Hook {hook} failed in flow {flow_id} at step {step_id:?}")]
    HookFailed {
        flow_id: String,
        step_id: Option<String>,
        hook: HookKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to load flow definitions from {path}")]
    DefinitionsLoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
