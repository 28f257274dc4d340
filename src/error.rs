use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranslatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read catalog {path}: {message}")]
    Catalog { path: PathBuf, message: String },

    #[error("{provider} request failed: {message}")]
    Provider { provider: String, message: String },

    #[error("{provider} rejected the credentials: {message}")]
    Authentication { provider: String, message: String },

    #[error("{0} client is not initialized")]
    NotInitialized(String),

    #[error("{provider} request timed out: {message}")]
    Timeout { provider: String, message: String },

    #[error("Unusable provider response: {0}")]
    ResponseFormat(String),

    #[error("Connection check failed: {0}")]
    ConnectionValidation(String),

    #[error("No target languages: {0}")]
    NoLanguages(String),

    #[error("Interrupted after saving {saved} translated entries")]
    Interrupted { saved: usize },

    #[error("Aborted by user")]
    Aborted,
}

impl TranslatorError {
    /// True for user-initiated stops, which are reported but are not failures.
    pub fn is_user_stop(&self) -> bool {
        matches!(self, Self::Interrupted { .. } | Self::Aborted)
    }
}

pub type Result<T> = std::result::Result<T, TranslatorError>;
