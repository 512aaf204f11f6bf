//! Capacity handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use serde_json::Value;

use crate::cache::CacheError;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

pub async fn get_capacity(State(state): State<ApiState>) -> Json<CapacityResponse> {
    Json(CapacityResponse {
        message: "Current cache capacity",
        capacity: state.cache.capacity(),
    })
}

/// Resize one or both tiers.
///
/// Resizing discards the affected tier's entries and resets the hit counters.
pub async fn put_capacity(
    State(state): State<ApiState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload
        .map_err(|err| ApiError::bad_request("Invalid request body", Some(err.body_text())))?;

    let near = capacity_field(&payload, "nearCapacity")?;
    let far = capacity_field(&payload, "farCapacity")?;

    let capacity = state
        .cache
        .set_capacity(near, far, true)
        .map_err(|err| match err {
            CacheError::InvalidCapacity { reason } => ApiError::invalid_capacity(reason),
        })?;

    Ok(Json(CapacityUpdateResponse {
        message: "Cache capacity updated",
        capacity,
        stats: state.cache.stats(),
    }))
}

/// Read an optional positive integer field from the request body.
fn capacity_field(payload: &Value, field: &'static str) -> Result<Option<usize>, ApiError> {
    let Some(object) = payload.as_object() else {
        return Err(ApiError::invalid_capacity("request body must be a JSON object"));
    };

    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .filter(|capacity| *capacity > 0)
            .and_then(|capacity| usize::try_from(capacity).ok())
            .map(Some)
            .ok_or_else(|| ApiError::invalid_capacity(format!("{field} must be a positive integer"))),
    }
}
