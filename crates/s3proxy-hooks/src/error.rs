//! Registration error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid position: {0}")]
    InvalidArgument(String),

    #[error("Position {0} is already taken")]
    DuplicatePosition(i64),

    #[error("Hook name '{0}' is already registered")]
    DuplicateName(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
