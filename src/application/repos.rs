//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::WordRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Insert payload for a new dictionary term.
///
/// `term`, `definitions` and `tags` are expected in normalised form.
#[derive(Debug, Clone)]
pub struct CreateWordParams {
    pub term: String,
    pub definitions: Vec<String>,
    pub tags: Vec<String>,
}

/// Partial update of an existing term. `None` keeps the stored value.
#[derive(Debug, Clone)]
pub struct UpdateWordParams {
    pub term: String,
    pub definitions: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

/// Filters for word listings. Matching is case-insensitive and by substring;
/// a word matches the tag filter when any of its tags contains any filter tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordQueryFilter {
    pub term: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetPage {
    pub offset: u64,
    pub limit: u32,
}

/// One page of words ordered by term, plus the number of matches overall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordListing {
    pub words: Vec<WordRecord>,
    pub total: u64,
}

#[async_trait]
pub trait WordsRepo: Send + Sync {
    async fn find_by_term(&self, term: &str) -> Result<Option<WordRecord>, RepoError>;

    /// Up to `limit` records, most recently updated first.
    async fn list_recently_updated(&self, limit: u32) -> Result<Vec<WordRecord>, RepoError>;

    async fn list_words(
        &self,
        filter: &WordQueryFilter,
        page: OffsetPage,
    ) -> Result<WordListing, RepoError>;
}

#[async_trait]
pub trait WordsWriteRepo: Send + Sync {
    /// Insert a new term. Fails with [`RepoError::Duplicate`] when it exists.
    async fn create_word(&self, params: CreateWordParams) -> Result<WordRecord, RepoError>;

    /// Apply `params` and bump `updated_at`. `None` when the term is unknown.
    async fn update_word(&self, params: UpdateWordParams)
    -> Result<Option<WordRecord>, RepoError>;

    /// Remove the term, returning the deleted record when it existed.
    async fn delete_word(&self, term: &str) -> Result<Option<WordRecord>, RepoError>;
}
