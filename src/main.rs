use std::{process, sync::Arc};

use lexicache::{
    application::{
        error::AppError,
        repos::{WordsRepo, WordsWriteRepo},
        warmer::{Warmer, WarmerConfig},
        words::{WordCache, WordService},
    },
    cache::{CacheConfig, spawn_sweeper},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        memory::InMemoryWordsRepo,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

struct Repositories {
    reader: Arc<dyn WordsRepo>,
    writer: Arc<dyn WordsWriteRepo>,
}

async fn init_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    let Some(url) = settings.database.url.as_deref() else {
        warn!("no database url configured, words are kept in memory only");
        let store = Arc::new(InMemoryWordsRepo::new());
        return Ok(Repositories {
            reader: store.clone(),
            writer: store,
        });
    };

    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;
    info!("database ready");

    let repositories = Arc::new(PostgresRepositories::new(pool));
    Ok(Repositories {
        reader: repositories.clone(),
        writer: repositories,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    let cache_config = CacheConfig::from(&settings.cache);
    let cache = Arc::new(WordCache::new(
        cache_config.near_capacity_non_zero().get(),
        cache_config.far_capacity_non_zero().get(),
    )?);
    info!(
        near_capacity = cache_config.near_capacity,
        far_capacity = cache_config.far_capacity,
        default_ttl = cache_config.default_ttl_seconds,
        "cache initialised"
    );

    let words = Arc::new(WordService::new(
        repositories.reader.clone(),
        repositories.writer,
        cache.clone(),
        cache_config.default_ttl(),
    ));

    let warmer_config = WarmerConfig::from(&settings.warmer);
    let warmer = Arc::new(Warmer::new(
        repositories.reader,
        cache.clone(),
        cache_config.default_ttl(),
        warmer_config.fetch_timeout,
    ));

    let sweeper = spawn_sweeper(cache, cache_config.sweep_interval());

    if warmer_config.enabled {
        warmer.start(&warmer_config).await;
    } else {
        info!("cache warmer disabled");
    }

    let result = serve_http(&settings, ApiState::new(words, warmer.clone())).await;

    warmer.unschedule();
    sweeper.abort();
    let _ = sweeper.await;

    result
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
