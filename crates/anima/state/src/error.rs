//! Error types for anima-state

use thiserror::Error;

/// Errors raised synchronously by direct state accessors.
///
/// The bulk delta path never produces these; it skips bad input instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    /// A value that is NaN or infinite was assigned to a field.
    #[error("Non-finite value for {field}: {value}")]
    NonFinite { field: String, value: f64 },

    /// Identity fields are fixed at birth.
    #[error("Field {0} is immutable after construction")]
    ImmutableField(String),

    /// Name does not match any mutable field.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Snapshot was written by an incompatible format version.
    #[error("Unsupported snapshot format version {found} (expected {expected})")]
    UnsupportedSnapshot { found: u32, expected: u32 },
}

/// Result type alias for state operations
pub type Result<T> = std::result::Result<T, StateError>;
