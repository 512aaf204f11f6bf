//! Bulk preloading of the word cache from the store.
//!
//! A [`Warmer`] pulls the most recently updated terms and writes them through
//! the cache. At most one warm runs at a time: a call that finds another warm
//! in progress returns a skipped report straight away instead of waiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::jobs::{parse_warm_schedule, spawn_warm_worker};
use crate::application::repos::{RepoError, WordsRepo};
use crate::application::words::{CachedValue, WordCache};

const METRIC_WARM_MS: &str = "lexicache_warm_ms";
const METRIC_WARM_SKIPPED: &str = "lexicache_warm_skipped_total";
const METRIC_WARM_FAILED: &str = "lexicache_warm_failed_total";

pub const DEFAULT_WARM_LIMIT: u32 = 50;
const DEFAULT_SCHEDULE: &str = "0 * * * *";
const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Error)]
pub enum WarmerError {
    #[error("failed to fetch recently updated words: {0}")]
    BackingStore(#[from] RepoError),
    #[error("fetching recently updated words timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("invalid warm schedule `{expression}`: {reason}")]
    InvalidSchedule { expression: String, reason: String },
}

impl WarmerError {
    pub fn invalid_schedule(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            expression: expression.into(),
            reason: reason.into(),
        }
    }
}

/// Runtime view of the `[warmer]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmerConfig {
    pub enabled: bool,
    pub warm_on_startup: bool,
    pub limit: u32,
    pub schedule: String,
    pub fetch_timeout: Duration,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warm_on_startup: true,
            limit: DEFAULT_WARM_LIMIT,
            schedule: DEFAULT_SCHEDULE.to_string(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
        }
    }
}

impl From<&crate::config::WarmerSettings> for WarmerConfig {
    fn from(settings: &crate::config::WarmerSettings) -> Self {
        Self {
            enabled: settings.enabled,
            warm_on_startup: settings.warm_on_startup,
            limit: settings.limit.get(),
            schedule: settings.schedule.clone(),
            fetch_timeout: Duration::from_secs(settings.fetch_timeout_seconds.get()),
        }
    }
}

/// Tier sizes and capacities right after a warm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheUsage {
    pub near_size: usize,
    pub near_capacity: usize,
    pub far_size: usize,
    pub far_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmReport {
    /// Records returned by the store.
    pub fetched: usize,
    /// Entries held by both tiers together after loading.
    pub cached: usize,
    /// True when another warm was already running.
    pub skipped: bool,
    pub usage: Option<CacheUsage>,
}

impl WarmReport {
    fn skipped() -> Self {
        Self {
            fetched: 0,
            cached: 0,
            skipped: true,
            usage: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmerStatus {
    pub is_warming: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_warmed_at: Option<OffsetDateTime>,
    /// Cron expression of the active recurring warm, if any.
    pub schedule: Option<String>,
}

struct ScheduledWarm {
    expression: String,
    handle: JoinHandle<()>,
}

/// Clears the warming flag when the run ends, however it ends.
struct WarmingGuard<'a>(&'a AtomicBool);

impl Drop for WarmingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Warmer {
    repo: Arc<dyn WordsRepo>,
    cache: Arc<WordCache>,
    ttl_seconds: i64,
    fetch_timeout: Duration,
    is_warming: AtomicBool,
    last_warmed_at: Mutex<Option<OffsetDateTime>>,
    scheduled: Mutex<Option<ScheduledWarm>>,
}

impl Warmer {
    pub fn new(
        repo: Arc<dyn WordsRepo>,
        cache: Arc<WordCache>,
        ttl_seconds: i64,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            ttl_seconds,
            fetch_timeout,
            is_warming: AtomicBool::new(false),
            last_warmed_at: Mutex::new(None),
            scheduled: Mutex::new(None),
        }
    }

    /// Load up to `limit` recently updated words into the cache.
    ///
    /// Returns a skipped report without touching the store when another run
    /// holds the warming flag.
    pub async fn run(&self, limit: u32) -> Result<WarmReport, WarmerError> {
        if self
            .is_warming
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            counter!(METRIC_WARM_SKIPPED).increment(1);
            info!(limit, "cache warming already in progress, skipping");
            return Ok(WarmReport::skipped());
        }
        let _guard = WarmingGuard(&self.is_warming);

        let started_at = Instant::now();
        let result = self.load(limit).await;
        histogram!(METRIC_WARM_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(report) => info!(
                fetched = report.fetched,
                cached = report.cached,
                "cache warming finished"
            ),
            Err(err) => {
                counter!(METRIC_WARM_FAILED).increment(1);
                warn!(error = %err, limit, "cache warming failed");
            }
        }

        result
    }

    async fn load(&self, limit: u32) -> Result<WarmReport, WarmerError> {
        let records = tokio::time::timeout(
            self.fetch_timeout,
            self.repo.list_recently_updated(limit),
        )
        .await
        .map_err(|_| WarmerError::Timeout {
            seconds: self.fetch_timeout.as_secs(),
        })??;

        let fetched = records.len();
        if fetched == 0 {
            info!("no words found for cache warming");
        }
        for record in records {
            let term = record.term.clone();
            self.cache
                .put(&term, CachedValue::Word(record), self.ttl_seconds);
        }

        *self
            .last_warmed_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(OffsetDateTime::now_utc());

        let stats = self.cache.stats();
        let usage = CacheUsage {
            near_size: stats.near_cache.size,
            near_capacity: stats.near_cache.capacity,
            far_size: stats.far_cache.size,
            far_capacity: stats.far_cache.capacity,
        };

        Ok(WarmReport {
            fetched,
            cached: usage.near_size + usage.far_size,
            skipped: false,
            usage: Some(usage),
        })
    }

    /// Register a recurring warm of `limit` words on a cron expression.
    ///
    /// Accepts five-field (`min hour dom mon dow`) expressions as well as the
    /// six- and seven-field forms with seconds and year. The first run happens
    /// at the next matching time, never immediately. A previous registration
    /// is stopped and replaced.
    pub fn schedule(self: &Arc<Self>, expression: &str, limit: u32) -> Result<(), WarmerError> {
        let schedule = parse_warm_schedule(expression)?;
        let handle = spawn_warm_worker(Arc::clone(self), schedule, limit);

        let previous = self
            .scheduled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(ScheduledWarm {
                expression: expression.trim().to_string(),
                handle,
            });
        if let Some(previous) = previous {
            previous.handle.abort();
        }

        info!(schedule = expression, limit, "scheduled cache warming");
        Ok(())
    }

    /// Startup sequence: the optional first warm, then the recurring schedule.
    ///
    /// Neither failure stops the service. Returns whether a schedule was
    /// registered.
    pub async fn start(self: &Arc<Self>, config: &WarmerConfig) -> bool {
        if config.warm_on_startup {
            if let Err(err) = self.run(config.limit).await {
                warn!(error = %err, "startup cache warming failed");
            }
        }

        match self.schedule(&config.schedule, config.limit) {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "cache warming schedule not registered");
                false
            }
        }
    }

    /// Stop the recurring warm. Returns false when none was registered.
    pub fn unschedule(&self) -> bool {
        let scheduled = self
            .scheduled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match scheduled {
            Some(scheduled) => {
                scheduled.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> WarmerStatus {
        WarmerStatus {
            is_warming: self.is_warming.load(Ordering::Acquire),
            last_warmed_at: *self
                .last_warmed_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            schedule: self
                .scheduled
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .map(|scheduled| scheduled.expression.clone()),
        }
    }
}
