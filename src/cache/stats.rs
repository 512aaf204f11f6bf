//! Request counters and the statistics view built from them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters shared by both tiers of a [`super::TieredCache`].
#[derive(Debug, Default)]
pub(crate) struct Counters {
    requests: AtomicU64,
    near_hits: AtomicU64,
    far_hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CounterSnapshot {
    pub requests: u64,
    pub near_hits: u64,
    pub far_hits: u64,
    pub misses: u64,
}

impl Counters {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_near_hit(&self) {
        self.near_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_far_hit(&self) {
        self.far_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Zero every counter. Each store is independent, so a `get` racing the
    /// reset can land between them; [`CacheStats::build`] tolerates that.
    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.near_hits.store(0, Ordering::Relaxed);
        self.far_hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            near_hits: self.near_hits.load(Ordering::Relaxed),
            far_hits: self.far_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Percentage of `requests` answered by `hits`; zero before any request.
pub fn hit_rate(hits: u64, requests: u64) -> f64 {
    if requests == 0 {
        return 0.0;
    }
    hits as f64 / requests as f64 * 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Point-in-time statistics for both tiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub near_cache: TierStats,
    pub far_cache: TierStats,
    pub overall: OverallStats,
}

impl CacheStats {
    pub(crate) fn build(
        counters: CounterSnapshot,
        near: (usize, usize),
        far: (usize, usize),
    ) -> Self {
        let hits = counters.near_hits + counters.far_hits;
        // A reset racing a lookup can leave outcomes ahead of requests.
        let requests = counters.requests.max(hits + counters.misses);
        Self {
            near_cache: TierStats {
                size: near.0,
                capacity: near.1,
                hits: counters.near_hits,
                hit_rate: hit_rate(counters.near_hits, requests),
            },
            far_cache: TierStats {
                size: far.0,
                capacity: far.1,
                hits: counters.far_hits,
                hit_rate: hit_rate(counters.far_hits, requests),
            },
            overall: OverallStats {
                requests,
                hits,
                misses: counters.misses,
                hit_rate: hit_rate(hits, requests),
            },
        }
    }
}
