use thiserror::Error;

/// Errors from memory maintenance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MemoryError {
    #[error("Invalid maintenance policy: {0}")]
    InvalidPolicy(String),

    #[error("Capacity must be greater than zero")]
    InvalidCapacity,
}

pub type Result<T> = std::result::Result<T, MemoryError>;
