//! Read-through and write-through access to dictionary terms.
//!
//! Single words are cached under their normalised term. Word listings are
//! cached under `list_` keys and dropped whenever a write changes the store.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::application::repos::{
    CreateWordParams, OffsetPage, RepoError, UpdateWordParams, WordQueryFilter, WordsRepo,
    WordsWriteRepo,
};
use crate::cache::{EntryMetadata, Tier, TieredCache, TieredHit};
use crate::domain::entities::WordRecord;
use crate::domain::error::DomainError;
use crate::domain::words::{normalize_definitions, normalize_tags, normalize_term};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
const LIST_KEY_PREFIX: &str = "list_";

/// Everything the word cache can hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CachedValue {
    Word(WordRecord),
    Page(WordPage),
}

/// The cache instance shared by the word service, the warmer and the HTTP layer.
pub type WordCache = TieredCache<CachedValue>;

#[derive(Debug, Error)]
pub enum WordServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("term `{term}` already exists")]
    AlreadyExists { term: String },
}

/// Where a looked-up word or listing was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WordSource {
    #[serde(rename = "cache-near")]
    CacheNear,
    #[serde(rename = "cache-far")]
    CacheFar,
    #[serde(rename = "database")]
    Database,
}

impl From<Tier> for WordSource {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Near => WordSource::CacheNear,
            Tier::Far => WordSource::CacheFar,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WordLookup {
    pub word: WordRecord,
    pub source: WordSource,
    /// Expiry of the cache entry that answered; `None` for store reads.
    pub metadata: Option<EntryMetadata>,
    /// TTL given to the entry cached from the store.
    pub cache_ttl: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_items: u64,
    pub total_pages: u64,
    pub current_page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordPage {
    pub words: Vec<WordRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone)]
pub struct WordPageLookup {
    pub page: WordPage,
    pub source: WordSource,
}

/// A validated listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordListQuery {
    page: u32,
    limit: u32,
    filter: WordQueryFilter,
}

impl WordListQuery {
    /// `tags` is a comma-separated list. Filters are trimmed and lowercased.
    pub fn new(
        page: u32,
        limit: u32,
        term: Option<&str>,
        tags: Option<&str>,
    ) -> Result<Self, DomainError> {
        if page == 0 {
            return Err(DomainError::validation("page must be at least 1"));
        }
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let term = term
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty());
        let tags = tags
            .map(|tags| normalize_tags(tags.split(',')))
            .unwrap_or_default();

        Ok(Self {
            page,
            limit,
            filter: WordQueryFilter { term, tags },
        })
    }

    pub fn cache_key(&self) -> String {
        format!(
            "{LIST_KEY_PREFIX}page{}_limit{}_term{}_tags{}",
            self.page,
            self.limit,
            self.filter.term.as_deref().unwrap_or_default(),
            self.filter.tags.join("+")
        )
    }

    fn offset_page(&self) -> OffsetPage {
        OffsetPage {
            offset: u64::from(self.page - 1) * u64::from(self.limit),
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateWordCommand {
    pub term: String,
    pub definitions: Vec<String>,
    pub tags: Vec<String>,
    /// Cache TTL in seconds; non-positive or missing uses the default.
    pub ttl: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct UpdateWordCommand {
    pub term: String,
    /// Replaces the stored definitions when present.
    pub definitions: Option<Vec<String>>,
    /// Replaces the stored tags when present.
    pub tags: Option<Vec<String>>,
    pub ttl: Option<i64>,
}

/// One entry of a bulk create. Missing fields are reported, not rejected.
#[derive(Debug, Clone, Default)]
pub struct BulkWordInput {
    pub term: Option<String>,
    pub definitions: Vec<String>,
    pub tags: Vec<String>,
    pub ttl: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedWord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkReport {
    pub added: Vec<WordRecord>,
    pub skipped: Vec<SkippedWord>,
}

#[derive(Debug, Clone)]
pub struct SavedWord {
    pub word: WordRecord,
    pub cache_ttl: i64,
}

#[derive(Debug, Clone)]
pub enum CacheLoad {
    /// The term was already cached; nothing changed.
    AlreadyCached(TieredHit<CachedValue>),
    /// The store has no such term.
    NotInStore,
    Loaded { word: WordRecord, ttl: i64 },
}

#[derive(Clone)]
pub struct WordService {
    reader: Arc<dyn WordsRepo>,
    writer: Arc<dyn WordsWriteRepo>,
    cache: Arc<WordCache>,
    default_ttl: i64,
}

impl WordService {
    pub fn new(
        reader: Arc<dyn WordsRepo>,
        writer: Arc<dyn WordsWriteRepo>,
        cache: Arc<WordCache>,
        default_ttl: i64,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
            default_ttl,
        }
    }

    pub fn cache(&self) -> &Arc<WordCache> {
        &self.cache
    }

    pub fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    /// Serve a term from the cache, falling back to the store.
    ///
    /// Store hits are cached with the default TTL.
    #[instrument(skip(self))]
    pub async fn lookup(&self, term: &str) -> Result<Option<WordLookup>, WordServiceError> {
        let term = normalize_term(term)?;

        if let Some(TieredHit {
            value: CachedValue::Word(word),
            tier,
            metadata,
        }) = self.cache.get(&term)
        {
            return Ok(Some(WordLookup {
                word,
                source: tier.into(),
                metadata: Some(metadata),
                cache_ttl: None,
            }));
        }

        let Some(word) = self.reader.find_by_term(&term).await? else {
            return Ok(None);
        };

        self.cache
            .put(&term, CachedValue::Word(word.clone()), self.default_ttl);
        debug!(term = %term, ttl = self.default_ttl, "cached word read from store");

        Ok(Some(WordLookup {
            word,
            source: WordSource::Database,
            metadata: None,
            cache_ttl: Some(self.default_ttl),
        }))
    }

    /// One page of words ordered by term, served from the cache when possible.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &WordListQuery) -> Result<WordPageLookup, WordServiceError> {
        let key = query.cache_key();

        if let Some(TieredHit {
            value: CachedValue::Page(page),
            tier,
            ..
        }) = self.cache.get(&key)
        {
            return Ok(WordPageLookup {
                page,
                source: tier.into(),
            });
        }

        let listing = self
            .reader
            .list_words(&query.filter, query.offset_page())
            .await?;
        let page = WordPage {
            pagination: Pagination {
                total_items: listing.total,
                total_pages: listing.total.div_ceil(u64::from(query.limit)),
                current_page: query.page,
                page_size: query.limit,
            },
            words: listing.words,
        };

        self.cache
            .put(&key, CachedValue::Page(page.clone()), self.default_ttl);
        debug!(key = %key, "cached word listing");

        Ok(WordPageLookup {
            page,
            source: WordSource::Database,
        })
    }

    /// Add a new term to the store and write it through the cache.
    #[instrument(skip(self, command), fields(term = %command.term))]
    pub async fn create(&self, command: CreateWordCommand) -> Result<SavedWord, WordServiceError> {
        let term = normalize_term(&command.term)?;
        let definitions = normalize_definitions(command.definitions)?;

        let word = self.insert(term, definitions, command.tags).await?;
        let cache_ttl = self.effective_ttl(command.ttl);
        self.cache
            .put(&word.term, CachedValue::Word(word.clone()), cache_ttl);
        self.invalidate_listings();

        Ok(SavedWord { word, cache_ttl })
    }

    /// Create every valid, unknown term in `words`.
    ///
    /// Entries with a missing term or definition, already stored terms and
    /// per-entry store failures are reported as skipped.
    #[instrument(skip(self, words), fields(count = words.len()))]
    pub async fn create_bulk(
        &self,
        words: Vec<BulkWordInput>,
        default_ttl: Option<i64>,
    ) -> BulkReport {
        let mut report = BulkReport::default();

        for input in words {
            let Some(term) = input.term.as_deref().and_then(|raw| normalize_term(raw).ok())
            else {
                report.skipped.push(SkippedWord {
                    term: input.term,
                    reason: "missing term".to_string(),
                });
                continue;
            };
            let Ok(definitions) = normalize_definitions(input.definitions) else {
                report.skipped.push(SkippedWord {
                    term: Some(term),
                    reason: "missing definitions".to_string(),
                });
                continue;
            };

            match self.insert(term.clone(), definitions, input.tags).await {
                Ok(word) => {
                    let ttl = self.effective_ttl(input.ttl.or(default_ttl));
                    self.cache.put(&word.term, CachedValue::Word(word.clone()), ttl);
                    report.added.push(word);
                }
                Err(WordServiceError::AlreadyExists { .. }) => report.skipped.push(SkippedWord {
                    term: Some(term),
                    reason: "term already exists".to_string(),
                }),
                Err(err) => report.skipped.push(SkippedWord {
                    term: Some(term),
                    reason: format!("error: {err}"),
                }),
            }
        }

        if !report.added.is_empty() {
            self.invalidate_listings();
        }
        info!(
            added = report.added.len(),
            skipped = report.skipped.len(),
            "bulk word creation finished"
        );
        report
    }

    /// Change an existing term and write it through the cache.
    ///
    /// Returns `None` when the store has no such term.
    #[instrument(skip(self, command), fields(term = %command.term))]
    pub async fn update(
        &self,
        command: UpdateWordCommand,
    ) -> Result<Option<SavedWord>, WordServiceError> {
        let term = normalize_term(&command.term)?;
        let definitions = command.definitions.map(normalize_definitions).transpose()?;

        let Some(word) = self
            .writer
            .update_word(UpdateWordParams {
                term: term.clone(),
                definitions,
                tags: command.tags.map(normalize_tags),
            })
            .await?
        else {
            return Ok(None);
        };

        let cache_ttl = self.effective_ttl(command.ttl);
        self.cache
            .put(&term, CachedValue::Word(word.clone()), cache_ttl);
        self.invalidate_listings();

        Ok(Some(SavedWord { word, cache_ttl }))
    }

    /// Delete a term from the store and both cache tiers.
    #[instrument(skip(self))]
    pub async fn remove(&self, term: &str) -> Result<Option<WordRecord>, WordServiceError> {
        let term = normalize_term(term)?;
        let removed = self.writer.delete_word(&term).await?;
        if removed.is_some() {
            self.cache.delete(&term);
            self.invalidate_listings();
        }
        Ok(removed)
    }

    /// Copy a stored term into the cache unless it is already cached.
    #[instrument(skip(self))]
    pub async fn load_into_cache(
        &self,
        term: &str,
        ttl: Option<i64>,
    ) -> Result<CacheLoad, WordServiceError> {
        let term = normalize_term(term)?;

        if let Some(hit) = self.cache.get(&term) {
            return Ok(CacheLoad::AlreadyCached(hit));
        }

        let Some(word) = self.reader.find_by_term(&term).await? else {
            return Ok(CacheLoad::NotInStore);
        };

        let ttl = ttl.unwrap_or(self.default_ttl);
        self.cache.put(&term, CachedValue::Word(word.clone()), ttl);
        Ok(CacheLoad::Loaded { word, ttl })
    }

    async fn insert(
        &self,
        term: String,
        definitions: Vec<String>,
        tags: Vec<String>,
    ) -> Result<WordRecord, WordServiceError> {
        self.writer
            .create_word(CreateWordParams {
                term: term.clone(),
                definitions,
                tags: normalize_tags(tags),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => WordServiceError::AlreadyExists { term },
                other => WordServiceError::Repo(other),
            })
    }

    /// Drop every cached listing from both tiers.
    fn invalidate_listings(&self) {
        let contents = self.cache.contents();
        let keys: BTreeSet<String> = contents
            .near
            .into_iter()
            .chain(contents.far)
            .filter(|entry| matches!(entry.value, CachedValue::Page(_)))
            .map(|entry| entry.key)
            .collect();

        for key in &keys {
            self.cache.delete(key);
        }
        if !keys.is_empty() {
            debug!(removed = keys.len(), "invalidated cached word listings");
        }
    }

    fn effective_ttl(&self, requested: Option<i64>) -> i64 {
        match requested {
            Some(ttl) if ttl > 0 => ttl,
            _ => self.default_ttl,
        }
    }
}
