//! Cache warmer administration handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::application::warmer::{DEFAULT_WARM_LIMIT, WarmerStatus};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

pub async fn get_warmer_status(State(state): State<ApiState>) -> Json<WarmerStatus> {
    Json(state.warmer.status())
}

/// Run a warm immediately. An empty body warms the default number of words.
pub async fn trigger_warm(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        WarmTriggerRequest::default()
    } else {
        serde_json::from_slice::<WarmTriggerRequest>(&body)
            .map_err(|err| ApiError::bad_request("Invalid request body", Some(err.to_string())))?
    };
    let limit = warm_limit(request.limit)?;

    let report = state
        .warmer
        .run(limit)
        .await
        .map_err(|err| ApiError::warm_failed(err.to_string()))?;

    let message = if report.skipped {
        "Cache warming already in progress"
    } else {
        "Cache warming completed"
    };

    Ok(Json(WarmTriggerResponse {
        message,
        limit,
        report,
    }))
}

fn warm_limit(requested: Option<i64>) -> Result<u32, ApiError> {
    match requested {
        None => Ok(DEFAULT_WARM_LIMIT),
        Some(limit) => u32::try_from(limit)
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or_else(|| {
                ApiError::bad_request(
                    "Invalid warm limit",
                    Some("limit must be a positive integer".to_string()),
                )
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_when_absent() {
        assert_eq!(warm_limit(None).unwrap(), DEFAULT_WARM_LIMIT);
    }

    #[test]
    fn limit_must_be_positive() {
        assert_eq!(warm_limit(Some(10)).unwrap(), 10);
        assert!(warm_limit(Some(0)).is_err());
        assert!(warm_limit(Some(-1)).is_err());
        assert!(warm_limit(Some(i64::MAX)).is_err());
    }
}
