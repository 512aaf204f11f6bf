//! Process-local word store.
//!
//! Backs the service when no database URL is configured and stands in for
//! Postgres in tests. Contents are lost when the process exits.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateWordParams, OffsetPage, RepoError, UpdateWordParams, WordListing, WordQueryFilter,
        WordsRepo, WordsWriteRepo,
    },
    domain::entities::WordRecord,
};

const TERM_CONSTRAINT: &str = "words_term_key";

#[derive(Debug, Default)]
pub struct InMemoryWordsRepo {
    words: RwLock<HashMap<String, WordRecord>>,
}

impl InMemoryWordsRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `records`, keyed by their term.
    pub fn from_records(records: impl IntoIterator<Item = WordRecord>) -> Self {
        let words = records
            .into_iter()
            .map(|record| (record.term.clone(), record))
            .collect();
        Self {
            words: RwLock::new(words),
        }
    }

    pub async fn len(&self) -> usize {
        self.words.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.words.read().await.is_empty()
    }
}

fn matches_filter(record: &WordRecord, filter: &WordQueryFilter) -> bool {
    if let Some(term) = filter.term.as_deref() {
        if !record.term.to_lowercase().contains(&term.to_lowercase()) {
            return false;
        }
    }
    if filter.tags.is_empty() {
        return true;
    }
    record.tags.iter().any(|tag| {
        let tag = tag.to_lowercase();
        filter
            .tags
            .iter()
            .any(|wanted| tag.contains(&wanted.to_lowercase()))
    })
}

#[async_trait]
impl WordsRepo for InMemoryWordsRepo {
    async fn find_by_term(&self, term: &str) -> Result<Option<WordRecord>, RepoError> {
        Ok(self.words.read().await.get(term).cloned())
    }

    async fn list_recently_updated(&self, limit: u32) -> Result<Vec<WordRecord>, RepoError> {
        let mut records: Vec<WordRecord> = self.words.read().await.values().cloned().collect();
        records.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.term.cmp(&b.term))
        });
        records.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(records)
    }

    async fn list_words(
        &self,
        filter: &WordQueryFilter,
        page: OffsetPage,
    ) -> Result<WordListing, RepoError> {
        let mut matching: Vec<WordRecord> = self
            .words
            .read()
            .await
            .values()
            .filter(|record| matches_filter(record, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.term.cmp(&b.term));

        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
        let words = matching.into_iter().skip(offset).take(limit).collect();

        Ok(WordListing { words, total })
    }
}

#[async_trait]
impl WordsWriteRepo for InMemoryWordsRepo {
    async fn create_word(&self, params: CreateWordParams) -> Result<WordRecord, RepoError> {
        if params.definitions.is_empty() {
            return Err(RepoError::InvalidInput {
                message: "definitions must not be empty".to_string(),
            });
        }

        let mut words = self.words.write().await;
        if words.contains_key(&params.term) {
            return Err(RepoError::Duplicate {
                constraint: TERM_CONSTRAINT.to_string(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let record = WordRecord {
            id: Uuid::new_v4(),
            term: params.term,
            definitions: params.definitions,
            tags: params.tags,
            created_at: now,
            updated_at: now,
        };
        words.insert(record.term.clone(), record.clone());
        Ok(record)
    }

    async fn update_word(
        &self,
        params: UpdateWordParams,
    ) -> Result<Option<WordRecord>, RepoError> {
        if params
            .definitions
            .as_ref()
            .is_some_and(|definitions| definitions.is_empty())
        {
            return Err(RepoError::InvalidInput {
                message: "definitions must not be empty".to_string(),
            });
        }

        let mut words = self.words.write().await;
        let Some(record) = words.get_mut(&params.term) else {
            return Ok(None);
        };
        if let Some(definitions) = params.definitions {
            record.definitions = definitions;
        }
        if let Some(tags) = params.tags {
            record.tags = tags;
        }
        record.updated_at = OffsetDateTime::now_utc();
        Ok(Some(record.clone()))
    }

    async fn delete_word(&self, term: &str) -> Result<Option<WordRecord>, RepoError> {
        Ok(self.words.write().await.remove(term))
    }
}
