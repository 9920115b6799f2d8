use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookwatchError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HookwatchError {
    /// Short error code string used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            HookwatchError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            HookwatchError::Config(_) => "CONFIG_ERROR",
            HookwatchError::Serialization(_) => "SERIALIZATION_ERROR",
            HookwatchError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for failures caused by the sender rather than by this process.
    pub fn is_client_error(&self) -> bool {
        matches!(self, HookwatchError::MalformedPayload(_))
    }
}

pub type Result<T> = std::result::Result<T, HookwatchError>;
