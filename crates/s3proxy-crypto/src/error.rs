//! Crypto error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid token")]
    InvalidToken,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
