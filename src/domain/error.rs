use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid word: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Human-readable detail without the error prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::Validation { message } => message,
        }
    }
}
