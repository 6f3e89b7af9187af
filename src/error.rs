// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types.

/// Application error type shared by the session, aggregation and storage layers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Session manager used before restore()")]
    NotRestored,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Identity provider error: {0}")]
    IdentityApi(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether repeating the same call later may succeed.
    ///
    /// Remote failures are retryable; bad input and missing sessions are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::IdentityApi(_))
    }

    /// Whether the error means the bearer token was rejected.
    pub fn is_token_error(&self) -> bool {
        matches!(self, AppError::InvalidToken | AppError::Unauthorized)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;
