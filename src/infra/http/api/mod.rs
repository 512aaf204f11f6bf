pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    routing::{get, post},
};

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(handlers::service_banner))
        .route(
            "/api/cache",
            get(handlers::get_cache).delete(handlers::clear_cache),
        )
        .route("/api/cache/stats", get(handlers::get_cache_stats))
        .route(
            "/api/cache/{term}",
            get(handlers::get_cached_entry)
                .post(handlers::load_cached_entry)
                .delete(handlers::delete_cached_entry),
        )
        .route(
            "/api/capacity",
            get(handlers::get_capacity).put(handlers::put_capacity),
        )
        .route("/api/admin/cache-warmer", get(handlers::get_warmer_status))
        .route(
            "/api/admin/cache-warmer/trigger",
            post(handlers::trigger_warm),
        )
        .route(
            "/api/words",
            get(handlers::list_words).post(handlers::create_word),
        )
        .route("/api/words/bulk", post(handlers::create_words_bulk))
        .route(
            "/api/words/{term}",
            get(handlers::get_word)
                .put(handlers::put_word)
                .delete(handlers::delete_word),
        )
        .with_state(state)
}
