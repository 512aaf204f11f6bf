use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("invalid cache capacity: {reason}")]
    InvalidCapacity { reason: String },
}

impl CacheError {
    pub fn invalid_capacity(reason: impl Into<String>) -> Self {
        Self::InvalidCapacity {
            reason: reason.into(),
        }
    }
}
