//! Error types for the runtime loop and its managers

use anima_memory::MemoryError;
use anima_state::StateError;
use thiserror::Error;

/// Error returned by an injected collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Collaborator failed: {0}")]
    Failed(String),
}

impl CollaboratorError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Snapshot persistence failures.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Persist rejected: {0}")]
    Rejected(String),
}

/// Log flush failures.
#[derive(Debug, Error)]
pub enum FlushError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Flush rejected: {0}")]
    Rejected(String),
}

/// Runtime errors.
///
/// Inside a tick these are contained and logged; they only reach callers
/// from construction, restore and thread management.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing component: {0}")]
    MissingComponent(&'static str),

    #[error("{stage} collaborator failed: {source}")]
    Collaborator {
        stage: &'static str,
        #[source]
        source: CollaboratorError,
    },

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Flush error: {0}")]
    Flush(#[from] FlushError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Panic contained in {stage}: {message}")]
    Panic { stage: &'static str, message: String },

    #[error("Failed to spawn loop thread: {0}")]
    Spawn(std::io::Error),
}

impl RuntimeError {
    pub(crate) fn collaborator(stage: &'static str) -> impl FnOnce(CollaboratorError) -> Self {
        move |source| RuntimeError::Collaborator { stage, source }
    }
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Render a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
