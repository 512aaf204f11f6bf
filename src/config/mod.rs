//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "lexicache";
const ENV_PREFIX: &str = "LEXICACHE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_NEAR_CAPACITY: u64 = 20;
const DEFAULT_FAR_CAPACITY: u64 = 100;
const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 300;
const DEFAULT_WARM_LIMIT: u64 = 50;
const DEFAULT_WARM_SCHEDULE: &str = "0 * * * *";
const DEFAULT_WARM_FETCH_TIMEOUT_SECONDS: u64 = 30;

/// Command-line arguments for the lexicache binary.
#[derive(Debug, Parser)]
#[command(
    name = "lexicache",
    version,
    about = "Developer dictionary with a two-tier cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "LEXICACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Append cache and warmer events to this file.
    #[arg(long = "cache-log-path", value_name = "PATH")]
    pub cache_log_path: Option<PathBuf>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the near tier capacity.
    #[arg(long = "cache-near-capacity", value_name = "COUNT")]
    pub cache_near_capacity: Option<u64>,

    /// Override the far tier capacity.
    #[arg(long = "cache-far-capacity", value_name = "COUNT")]
    pub cache_far_capacity: Option<u64>,

    /// Override the default cache entry TTL.
    #[arg(long = "cache-default-ttl-seconds", value_name = "SECONDS")]
    pub cache_default_ttl_seconds: Option<u64>,

    /// Override the expiry sweep period.
    #[arg(long = "cache-sweep-interval-seconds", value_name = "SECONDS")]
    pub cache_sweep_interval_seconds: Option<u64>,

    /// Enable or disable the cache warmer.
    #[arg(
        long = "warmer-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub warmer_enabled: Option<bool>,

    /// Enable or disable warming at start-up.
    #[arg(
        long = "warmer-warm-on-startup",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub warmer_warm_on_startup: Option<bool>,

    /// Override how many words a warm loads.
    #[arg(long = "warmer-limit", value_name = "COUNT")]
    pub warmer_limit: Option<u64>,

    /// Override the cron expression of the recurring warm.
    #[arg(long = "warmer-schedule", value_name = "CRON")]
    pub warmer_schedule: Option<String>,

    /// Override the warm fetch timeout.
    #[arg(long = "warmer-fetch-timeout-seconds", value_name = "SECONDS")]
    pub warmer_fetch_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub warmer: WarmerSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
    pub cache_log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// `None` runs the service on the in-process store.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub near_capacity: NonZeroUsize,
    pub far_capacity: NonZeroUsize,
    pub default_ttl_seconds: NonZeroU64,
    pub sweep_interval_seconds: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct WarmerSettings {
    pub enabled: bool,
    pub warm_on_startup: bool,
    pub limit: NonZeroU32,
    pub schedule: String,
    pub fetch_timeout_seconds: NonZeroU64,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    warmer: RawWarmerSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = overrides.cache_log_path.as_ref() {
            self.logging.cache_log_path = Some(path.clone());
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(value) = overrides.cache_near_capacity {
            self.cache.near_capacity = Some(value);
        }
        if let Some(value) = overrides.cache_far_capacity {
            self.cache.far_capacity = Some(value);
        }
        if let Some(value) = overrides.cache_default_ttl_seconds {
            self.cache.default_ttl_seconds = Some(value);
        }
        if let Some(value) = overrides.cache_sweep_interval_seconds {
            self.cache.sweep_interval_seconds = Some(value);
        }
        if let Some(value) = overrides.warmer_enabled {
            self.warmer.enabled = Some(value);
        }
        if let Some(value) = overrides.warmer_warm_on_startup {
            self.warmer.warm_on_startup = Some(value);
        }
        if let Some(value) = overrides.warmer_limit {
            self.warmer.limit = Some(value);
        }
        if let Some(value) = overrides.warmer_schedule.as_ref() {
            self.warmer.schedule = Some(value.clone());
        }
        if let Some(value) = overrides.warmer_fetch_timeout_seconds {
            self.warmer.fetch_timeout_seconds = Some(value);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            warmer,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            warmer: build_warmer_settings(warmer)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    let cache_log_path = match logging.cache_log_path {
        Some(path) if path.as_os_str().is_empty() => {
            return Err(LoadError::invalid(
                "logging.cache_log_path",
                "path must not be empty",
            ));
        }
        other => other,
    };

    Ok(LoggingSettings {
        level,
        format,
        cache_log_path,
    })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value.into(), "database.max_connections")?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let near_capacity = non_zero_usize(
        cache.near_capacity.unwrap_or(DEFAULT_NEAR_CAPACITY),
        "cache.near_capacity",
    )?;
    let far_capacity = non_zero_usize(
        cache.far_capacity.unwrap_or(DEFAULT_FAR_CAPACITY),
        "cache.far_capacity",
    )?;
    let default_ttl_seconds = non_zero_u64(
        cache.default_ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS),
        "cache.default_ttl_seconds",
    )?;
    let sweep_interval_seconds = non_zero_u64(
        cache
            .sweep_interval_seconds
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECONDS),
        "cache.sweep_interval_seconds",
    )?;

    Ok(CacheSettings {
        near_capacity,
        far_capacity,
        default_ttl_seconds,
        sweep_interval_seconds,
    })
}

fn build_warmer_settings(warmer: RawWarmerSettings) -> Result<WarmerSettings, LoadError> {
    let limit = non_zero_u32(
        warmer.limit.unwrap_or(DEFAULT_WARM_LIMIT),
        "warmer.limit",
    )?;
    let fetch_timeout_seconds = non_zero_u64(
        warmer
            .fetch_timeout_seconds
            .unwrap_or(DEFAULT_WARM_FETCH_TIMEOUT_SECONDS),
        "warmer.fetch_timeout_seconds",
    )?;

    let schedule = warmer
        .schedule
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_WARM_SCHEDULE.to_string());
    if schedule.is_empty() {
        return Err(LoadError::invalid(
            "warmer.schedule",
            "cron expression must not be empty",
        ));
    }

    Ok(WarmerSettings {
        enabled: warmer.enabled.unwrap_or(true),
        warm_on_startup: warmer.warm_on_startup.unwrap_or(true),
        limit,
        schedule,
        fetch_timeout_seconds,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
    cache_log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    near_capacity: Option<u64>,
    far_capacity: Option<u64>,
    default_ttl_seconds: Option<u64>,
    sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWarmerSettings {
    enabled: Option<bool>,
    warm_on_startup: Option<bool>,
    limit: Option<u64>,
    schedule: Option<String>,
    fetch_timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_u64(value: u64, key: &'static str) -> Result<NonZeroU64, LoadError> {
    NonZeroU64::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value_usize: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value_usize)
        .ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
