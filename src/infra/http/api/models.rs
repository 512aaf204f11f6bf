use serde::{Deserialize, Serialize};

use crate::application::warmer::WarmReport;
use crate::application::words::{
    BulkReport, BulkWordInput, CachedValue, CreateWordCommand, UpdateWordCommand, WordPage,
    WordSource,
};
use crate::cache::{CacheStats, CapacitySnapshot, EntryMetadata, Tier, TieredContents};
use crate::domain::entities::WordRecord;

#[derive(Debug, Serialize)]
pub struct ServiceBanner {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct CacheOverviewResponse {
    pub stats: CacheStats,
    pub cache: TieredContents<CachedValue>,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub message: &'static str,
    pub stats: CacheStats,
}

#[derive(Debug, Serialize)]
pub struct CachedEntryResponse {
    pub term: String,
    pub tier: Tier,
    pub value: CachedValue,
    #[serde(flatten)]
    pub metadata: EntryMetadata,
}

#[derive(Debug, Deserialize, Default)]
pub struct CacheLoadQuery {
    pub ttl: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CacheLoadResponse {
    pub message: &'static str,
    pub term: String,
    pub ttl: i64,
    pub value: WordRecord,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CapacityResponse {
    pub message: &'static str,
    pub capacity: CapacitySnapshot,
}

#[derive(Debug, Serialize)]
pub struct CapacityUpdateResponse {
    pub message: &'static str,
    pub capacity: CapacitySnapshot,
    pub stats: CacheStats,
}

#[derive(Debug, Deserialize, Default)]
pub struct WarmTriggerRequest {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct WarmTriggerResponse {
    pub message: &'static str,
    pub limit: u32,
    #[serde(flatten)]
    pub report: WarmReport,
}

/// A single `definition` wins over a `definitions` list.
fn merge_definitions(
    definition: Option<String>,
    definitions: Option<Vec<String>>,
) -> Option<Vec<String>> {
    match definition {
        Some(definition) => Some(vec![definition]),
        None => definitions,
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct WordListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub term: Option<String>,
    /// Comma-separated.
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WordCreateRequest {
    pub term: String,
    pub definition: Option<String>,
    pub definitions: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub ttl: Option<i64>,
}

impl From<WordCreateRequest> for CreateWordCommand {
    fn from(request: WordCreateRequest) -> Self {
        Self {
            term: request.term,
            definitions: merge_definitions(request.definition, request.definitions)
                .unwrap_or_default(),
            tags: request.tags,
            ttl: request.ttl,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WordUpdateRequest {
    pub definition: Option<String>,
    pub definitions: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub ttl: Option<i64>,
}

impl WordUpdateRequest {
    pub fn into_command(self, term: String) -> UpdateWordCommand {
        UpdateWordCommand {
            term,
            definitions: merge_definitions(self.definition, self.definitions),
            tags: self.tags,
            ttl: self.ttl,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkWordRequest {
    pub term: Option<String>,
    pub definition: Option<String>,
    pub definitions: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub ttl: Option<i64>,
}

impl From<BulkWordRequest> for BulkWordInput {
    fn from(request: BulkWordRequest) -> Self {
        Self {
            term: request.term,
            definitions: merge_definitions(request.definition, request.definitions)
                .unwrap_or_default(),
            tags: request.tags,
            ttl: request.ttl,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateRequest {
    #[serde(default)]
    pub words: Vec<BulkWordRequest>,
    pub default_ttl: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BulkCreateResponse {
    pub message: String,
    pub results: BulkReport,
}

#[derive(Debug, Serialize)]
pub struct WordListResponse {
    #[serde(flatten)]
    pub page: WordPage,
    pub source: WordSource,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordLookupResponse {
    pub word: WordRecord,
    pub source: WordSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<EntryMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordSavedResponse {
    pub message: &'static str,
    pub word: WordRecord,
    pub cache_ttl: i64,
}

#[derive(Debug, Serialize)]
pub struct WordDeletedResponse {
    pub message: &'static str,
    pub word: WordRecord,
}
