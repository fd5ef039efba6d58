//! API Error Types
//!
//! Errors raised while binding and running the HTTP server.

use thiserror::Error;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error, e.g. the listen address is unavailable
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
