use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateWordParams, OffsetPage, RepoError, UpdateWordParams, WordListing, WordQueryFilter,
        WordsRepo, WordsWriteRepo,
    },
    domain::entities::WordRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct WordRow {
    id: Uuid,
    term: String,
    definitions: Vec<String>,
    tags: Vec<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<WordRow> for WordRecord {
    fn from(row: WordRow) -> Self {
        Self {
            id: row.id,
            term: row.term,
            definitions: row.definitions,
            tags: row.tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn push_word_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &WordQueryFilter) {
    if let Some(term) = filter.term.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        qb.push(" AND term ILIKE ");
        qb.push_bind(format!("%{term}%"));
    }

    if !filter.tags.is_empty() {
        let patterns: Vec<String> = filter.tags.iter().map(|tag| format!("%{tag}%")).collect();
        qb.push(" AND EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ILIKE ANY(");
        qb.push_bind(patterns);
        qb.push("))");
    }
}

#[async_trait]
impl WordsRepo for PostgresRepositories {
    async fn find_by_term(&self, term: &str) -> Result<Option<WordRecord>, RepoError> {
        let row = sqlx::query_as::<_, WordRow>(
            r#"
            SELECT id, term, definitions, tags, created_at, updated_at
            FROM words
            WHERE term = $1
            "#,
        )
        .bind(term)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(WordRecord::from))
    }

    async fn list_recently_updated(&self, limit: u32) -> Result<Vec<WordRecord>, RepoError> {
        let rows = sqlx::query_as::<_, WordRow>(
            r#"
            SELECT id, term, definitions, tags, created_at, updated_at
            FROM words
            ORDER BY updated_at DESC, term
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(WordRecord::from).collect())
    }

    async fn list_words(
        &self,
        filter: &WordQueryFilter,
        page: OffsetPage,
    ) -> Result<WordListing, RepoError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM words WHERE 1=1");
        push_word_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(
            "SELECT id, term, definitions, tags, created_at, updated_at FROM words WHERE 1=1",
        );
        push_word_filter(&mut qb, filter);
        qb.push(" ORDER BY term ASC LIMIT ");
        qb.push_bind(i64::from(page.limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(page.offset).unwrap_or(i64::MAX));

        let rows = qb
            .build_query_as::<WordRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(WordListing {
            words: rows.into_iter().map(WordRecord::from).collect(),
            total: u64::try_from(total).unwrap_or(0),
        })
    }
}

#[async_trait]
impl WordsWriteRepo for PostgresRepositories {
    async fn create_word(&self, params: CreateWordParams) -> Result<WordRecord, RepoError> {
        let row = sqlx::query_as::<_, WordRow>(
            r#"
            INSERT INTO words (id, term, definitions, tags)
            VALUES ($1, $2, $3, $4)
            RETURNING id, term, definitions, tags, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&params.term)
        .bind(&params.definitions)
        .bind(&params.tags)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_word(
        &self,
        params: UpdateWordParams,
    ) -> Result<Option<WordRecord>, RepoError> {
        let row = sqlx::query_as::<_, WordRow>(
            r#"
            UPDATE words
            SET definitions = COALESCE($2, definitions),
                tags = COALESCE($3, tags),
                updated_at = now()
            WHERE term = $1
            RETURNING id, term, definitions, tags, created_at, updated_at
            "#,
        )
        .bind(&params.term)
        .bind(params.definitions.as_deref())
        .bind(params.tags.as_deref())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(WordRecord::from))
    }

    async fn delete_word(&self, term: &str) -> Result<Option<WordRecord>, RepoError> {
        let row = sqlx::query_as::<_, WordRow>(
            r#"
            DELETE FROM words
            WHERE term = $1
            RETURNING id, term, definitions, tags, created_at, updated_at
            "#,
        )
        .bind(term)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(WordRecord::from))
    }
}
