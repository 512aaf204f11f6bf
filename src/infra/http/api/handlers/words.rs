//! Word handlers

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::words::{DEFAULT_PAGE_SIZE, WordListQuery};

use super::{domain_to_api, word_service_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|err| ApiError::bad_request("Invalid request body", Some(err.body_text())))
}

pub async fn list_words(
    State(state): State<ApiState>,
    params: Result<Query<WordListParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params
        .map_err(|err| ApiError::bad_request("Invalid query", Some(err.body_text())))?;

    let query = WordListQuery::new(
        params.page.unwrap_or(1),
        params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        params.term.as_deref(),
        params.tags.as_deref(),
    )
    .map_err(domain_to_api)?;

    let listed = state
        .words
        .list(&query)
        .await
        .map_err(word_service_to_api)?;

    Ok(Json(WordListResponse {
        page: listed.page,
        source: listed.source,
    }))
}

pub async fn get_word(
    State(state): State<ApiState>,
    Path(term): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lookup = state
        .words
        .lookup(&term)
        .await
        .map_err(word_service_to_api)?;

    match lookup {
        Some(lookup) => Ok(Json(WordLookupResponse {
            word: lookup.word,
            source: lookup.source,
            cache: lookup.metadata,
            cache_ttl: lookup.cache_ttl,
        })),
        None => Err(ApiError::not_found("word not found")),
    }
}

pub async fn create_word(
    State(state): State<ApiState>,
    payload: Result<Json<WordCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;

    let saved = state
        .words
        .create(payload.into())
        .await
        .map_err(word_service_to_api)?;

    Ok((
        StatusCode::CREATED,
        Json(WordSavedResponse {
            message: "Word created",
            word: saved.word,
            cache_ttl: saved.cache_ttl,
        }),
    ))
}

pub async fn create_words_bulk(
    State(state): State<ApiState>,
    payload: Result<Json<BulkCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;
    if payload.words.is_empty() {
        return Err(ApiError::bad_request(
            "An array of words is required",
            Some("`words` must contain at least one entry".to_string()),
        ));
    }

    let inputs = payload.words.into_iter().map(Into::into).collect();
    let results = state.words.create_bulk(inputs, payload.default_ttl).await;

    Ok((
        StatusCode::CREATED,
        Json(BulkCreateResponse {
            message: format!(
                "Bulk operation completed. Added: {}, skipped: {}",
                results.added.len(),
                results.skipped.len()
            ),
            results,
        }),
    ))
}

pub async fn put_word(
    State(state): State<ApiState>,
    Path(term): Path<String>,
    payload: Result<Json<WordUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;

    let saved = state
        .words
        .update(payload.into_command(term))
        .await
        .map_err(word_service_to_api)?;

    match saved {
        Some(saved) => Ok(Json(WordSavedResponse {
            message: "Word updated",
            word: saved.word,
            cache_ttl: saved.cache_ttl,
        })),
        None => Err(ApiError::not_found("word not found")),
    }
}

pub async fn delete_word(
    State(state): State<ApiState>,
    Path(term): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .words
        .remove(&term)
        .await
        .map_err(word_service_to_api)?;

    match removed {
        Some(word) => Ok(Json(WordDeletedResponse {
            message: "Word deleted",
            word,
        })),
        None => Err(ApiError::not_found("word not found")),
    }
}
