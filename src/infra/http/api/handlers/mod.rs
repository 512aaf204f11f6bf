//! API handlers organized by resource.
//!
//! Error conversions shared by the resource modules live here.

mod admin;
mod cache;
mod capacity;
mod words;

pub use admin::*;
pub use cache::*;
pub use capacity::*;
pub use words::*;

use axum::Json;
use axum::http::StatusCode;

use crate::application::repos::RepoError;
use crate::application::words::WordServiceError;
use crate::domain::error::DomainError;
use crate::domain::words::normalize_term;
use crate::infra::http::api::models::ServiceBanner;

use super::error::{ApiError, codes};

const ENDPOINTS: &[&str] = &[
    "GET /api/cache",
    "GET /api/cache/stats",
    "DELETE /api/cache",
    "GET /api/cache/{term}",
    "POST /api/cache/{term}?ttl=",
    "DELETE /api/cache/{term}",
    "GET /api/capacity",
    "PUT /api/capacity",
    "GET /api/admin/cache-warmer",
    "POST /api/admin/cache-warmer/trigger",
    "GET /api/words?page=&limit=&term=&tags=",
    "POST /api/words",
    "POST /api/words/bulk",
    "GET /api/words/{term}",
    "PUT /api/words/{term}",
    "DELETE /api/words/{term}",
];

pub async fn service_banner() -> Json<ServiceBanner> {
    Json(ServiceBanner {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS,
    })
}

pub(crate) fn path_term(raw: &str) -> Result<String, ApiError> {
    normalize_term(raw).map_err(domain_to_api)
}

pub(crate) fn domain_to_api(err: DomainError) -> ApiError {
    ApiError::bad_request("Invalid word", Some(err.detail().to_string()))
}

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(msg) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(msg),
        ),
    }
}

pub(crate) fn word_service_to_api(err: WordServiceError) -> ApiError {
    match err {
        WordServiceError::Domain(domain) => domain_to_api(domain),
        WordServiceError::Repo(repo) => repo_to_api(repo),
        WordServiceError::AlreadyExists { term } => ApiError::conflict(
            "Term already exists",
            Some(format!("use PUT /api/words/{term} to update the existing term")),
        ),
    }
}
