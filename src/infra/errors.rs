// src/infra/errors.rs — Error types for avatar-studio

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AvatarError {
    // Session credential / provider errors
    #[error("Failed to obtain session credential: {0}")]
    Credential(String),

    #[error("Provider call '{operation}' failed: {message}")]
    Provider { operation: String, message: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    // Coordinator guard errors
    #[error("No active avatar session")]
    NotStreaming,

    #[error("An avatar session is already active")]
    SessionActive,

    #[error("A previous request is still in flight")]
    Busy,

    #[error("Knowledge base is empty")]
    EmptyKnowledge,

    // Knowledge extraction
    #[error("Document extraction failed: {0}")]
    Extraction(String),

    #[error("Authentication token not found")]
    MissingAuthToken,

    // Auth gateway
    #[error("{0}")]
    Auth(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AvatarError {
    pub fn provider(operation: &str, message: impl Into<String>) -> Self {
        AvatarError::Provider {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Whether the failure should surface in the UI. Speak/interrupt failures
    /// and remote disconnects are absorbed silently.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            AvatarError::Busy | AvatarError::NotStreaming | AvatarError::Provider { .. }
        )
    }
}

impl From<reqwest::Error> for AvatarError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => AvatarError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => AvatarError::Other(anyhow::Error::new(e)),
        }
    }
}
