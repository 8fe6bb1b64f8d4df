//! Error types for snapsweep operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SweepError>;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid name pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("{service} API returned {status}: {message}")]
    Api {
        service: String,
        status: u16,
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Operation cancelled by user")]
    Cancelled,
}

impl SweepError {
    pub fn api(service: impl Into<String>, status: u16, msg: impl Into<String>) -> Self {
        Self::Api {
            service: service.into(),
            status,
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}
