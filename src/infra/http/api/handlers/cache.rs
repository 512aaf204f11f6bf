//! Cache inspection and manipulation handlers.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::words::CacheLoad;

use super::{path_term, word_service_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

pub async fn get_cache(State(state): State<ApiState>) -> Json<CacheOverviewResponse> {
    Json(CacheOverviewResponse {
        stats: state.cache.stats(),
        cache: state.cache.contents(),
    })
}

pub async fn get_cache_stats(State(state): State<ApiState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        message: "Cache statistics",
        stats: state.cache.stats(),
    })
}

pub async fn clear_cache(State(state): State<ApiState>) -> Json<CacheStatsResponse> {
    state.cache.clear();
    Json(CacheStatsResponse {
        message: "Cache cleared",
        stats: state.cache.stats(),
    })
}

pub async fn get_cached_entry(
    State(state): State<ApiState>,
    Path(term): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let term = path_term(&term)?;

    match state.cache.get(&term) {
        Some(hit) => Ok(Json(CachedEntryResponse {
            term,
            tier: hit.tier,
            value: hit.value,
            metadata: hit.metadata,
        })),
        None => Err(ApiError::not_found("term not cached")),
    }
}

pub async fn load_cached_entry(
    State(state): State<ApiState>,
    Path(term): Path<String>,
    query: Result<Query<CacheLoadQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) =
        query.map_err(|err| ApiError::bad_request("Invalid ttl", Some(err.body_text())))?;

    let outcome = state
        .words
        .load_into_cache(&term, query.ttl)
        .await
        .map_err(word_service_to_api)?;

    match outcome {
        CacheLoad::AlreadyCached(hit) => Err(ApiError::conflict(
            "Term already cached",
            Some(format!("found in {} tier", hit.tier.as_str())),
        )),
        CacheLoad::NotInStore => Err(ApiError::not_found("term not found")),
        CacheLoad::Loaded { word, ttl } => Ok((
            StatusCode::CREATED,
            Json(CacheLoadResponse {
                message: "Term cached",
                term: word.term.clone(),
                ttl,
                value: word,
            }),
        )),
    }
}

pub async fn delete_cached_entry(
    State(state): State<ApiState>,
    Path(term): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let term = path_term(&term)?;

    if !state.cache.delete(&term) {
        return Err(ApiError::not_found("term not cached"));
    }

    Ok(Json(MessageResponse {
        message: "Term removed from cache",
        term: Some(term),
    }))
}
