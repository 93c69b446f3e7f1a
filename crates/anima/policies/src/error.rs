//! Policy configuration errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("Invalid policy setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, PolicyError>;
