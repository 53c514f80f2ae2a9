use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdealxError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdealxError {
    /// Short error code string used in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            IdealxError::Config(_) => "CONFIG_ERROR",
            IdealxError::InvalidInput(_) => "INVALID_INPUT",
            IdealxError::Serialization(_) => "SERIALIZATION_ERROR",
            IdealxError::Io(_) => "IO_ERROR",
            IdealxError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, IdealxError>;
