//! Two-tier cache: a small near tier in front of a larger far tier.
//!
//! Writes go through to both tiers. Reads check the near tier first and
//! promote far-tier hits into the near tier. Each tier sits behind its own
//! mutex and no operation ever holds both locks.

use std::sync::Mutex;

use metrics::counter;
use serde::Serialize;
use tracing::info;

use super::error::CacheError;
use super::lock::mutex_lock;
use super::stats::{CacheStats, Counters};
use super::ttl::{EntryMetadata, EntrySnapshot, TtlCache};

const SOURCE: &str = "cache::tiered";

const METRIC_HIT: &str = "lexicache_cache_hit_total";
const METRIC_MISS: &str = "lexicache_cache_miss_total";
const METRIC_PROMOTION: &str = "lexicache_cache_promotion_total";
const METRIC_EVICT: &str = "lexicache_cache_evict_total";
const METRIC_EXPIRED: &str = "lexicache_cache_expired_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Near,
    Far,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Near => "near",
            Tier::Far => "far",
        }
    }
}

/// A value found in one of the tiers, with that tier's expiry metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TieredHit<V> {
    pub value: V,
    pub tier: Tier,
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieredContents<V> {
    pub near: Vec<EntrySnapshot<V>>,
    pub far: Vec<EntrySnapshot<V>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacitySnapshot {
    pub near_capacity: usize,
    pub far_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub near_removed: usize,
    pub far_removed: usize,
    pub total: usize,
}

pub struct TieredCache<V> {
    near: Mutex<TtlCache<V>>,
    far: Mutex<TtlCache<V>>,
    counters: Counters,
}

impl<V> TieredCache<V> {
    pub fn new(near_capacity: usize, far_capacity: usize) -> Result<Self, CacheError> {
        Ok(Self {
            near: Mutex::new(TtlCache::with_capacity(Tier::Near.as_str(), near_capacity)?),
            far: Mutex::new(TtlCache::with_capacity(Tier::Far.as_str(), far_capacity)?),
            counters: Counters::default(),
        })
    }

    /// Write `value` to both tiers with the same TTL.
    ///
    /// Each tier evicts independently when full.
    pub fn put(&self, key: &str, value: V, ttl_seconds: i64)
    where
        V: Clone,
    {
        let near_evicted =
            mutex_lock(&self.near, SOURCE, "put.near").put(key, value.clone(), ttl_seconds);
        if near_evicted.is_some() {
            counter!(METRIC_EVICT, "tier" => Tier::Near.as_str()).increment(1);
        }

        let far_evicted = mutex_lock(&self.far, SOURCE, "put.far").put(key, value, ttl_seconds);
        if far_evicted.is_some() {
            counter!(METRIC_EVICT, "tier" => Tier::Far.as_str()).increment(1);
        }
    }

    /// Remove `key` from both tiers. True when either tier held it.
    pub fn delete(&self, key: &str) -> bool {
        let in_near = mutex_lock(&self.near, SOURCE, "delete.near").delete(key);
        let in_far = mutex_lock(&self.far, SOURCE, "delete.far").delete(key);
        in_near || in_far
    }

    /// Empty both tiers and zero the request counters.
    pub fn clear(&self) {
        mutex_lock(&self.near, SOURCE, "clear.near").clear();
        mutex_lock(&self.far, SOURCE, "clear.far").clear();
        self.counters.reset();
        info!("cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let near = {
            let near = mutex_lock(&self.near, SOURCE, "stats.near");
            (near.len(), near.capacity())
        };
        let far = {
            let far = mutex_lock(&self.far, SOURCE, "stats.far");
            (far.len(), far.capacity())
        };
        CacheStats::build(self.counters.snapshot(), near, far)
    }

    pub fn capacity(&self) -> CapacitySnapshot {
        CapacitySnapshot {
            near_capacity: mutex_lock(&self.near, SOURCE, "capacity.near").capacity(),
            far_capacity: mutex_lock(&self.far, SOURCE, "capacity.far").capacity(),
        }
    }

    /// Replace the given tiers with fresh, empty tiers of the new capacity.
    ///
    /// Both values are validated before either tier is touched. Entries in a
    /// resized tier are discarded.
    pub fn set_capacity(
        &self,
        near_capacity: Option<usize>,
        far_capacity: Option<usize>,
        reset_stats: bool,
    ) -> Result<CapacitySnapshot, CacheError> {
        if near_capacity.is_none() && far_capacity.is_none() {
            return Err(CacheError::invalid_capacity(
                "at least one of near or far capacity must be provided",
            ));
        }

        let near = near_capacity
            .map(|capacity| TtlCache::with_capacity(Tier::Near.as_str(), capacity))
            .transpose()?;
        let far = far_capacity
            .map(|capacity| TtlCache::with_capacity(Tier::Far.as_str(), capacity))
            .transpose()?;

        if let Some(near) = near {
            *mutex_lock(&self.near, SOURCE, "set_capacity.near") = near;
        }
        if let Some(far) = far {
            *mutex_lock(&self.far, SOURCE, "set_capacity.far") = far;
        }
        if reset_stats {
            self.counters.reset();
        }

        let snapshot = self.capacity();
        info!(
            near_capacity = snapshot.near_capacity,
            far_capacity = snapshot.far_capacity,
            reset_stats,
            "cache capacity updated"
        );
        Ok(snapshot)
    }

    /// Drop every expired entry from both tiers.
    pub fn sweep_expired(&self) -> SweepReport {
        let near_removed = mutex_lock(&self.near, SOURCE, "sweep.near").sweep_expired();
        let far_removed = mutex_lock(&self.far, SOURCE, "sweep.far").sweep_expired();

        if near_removed > 0 {
            counter!(METRIC_EXPIRED, "tier" => Tier::Near.as_str()).increment(near_removed as u64);
        }
        if far_removed > 0 {
            counter!(METRIC_EXPIRED, "tier" => Tier::Far.as_str()).increment(far_removed as u64);
        }

        SweepReport {
            near_removed,
            far_removed,
            total: near_removed + far_removed,
        }
    }
}

impl<V: Clone> TieredCache<V> {
    /// Look up `key`, near tier first.
    ///
    /// A far-tier hit is copied into the near tier without a TTL and is
    /// reported with the far tier's metadata.
    pub fn get(&self, key: &str) -> Option<TieredHit<V>> {
        self.counters.record_request();

        let near_hit = mutex_lock(&self.near, SOURCE, "get.near").get(key);
        if let Some(hit) = near_hit {
            self.counters.record_near_hit();
            counter!(METRIC_HIT, "tier" => Tier::Near.as_str()).increment(1);
            return Some(TieredHit {
                value: hit.value,
                tier: Tier::Near,
                metadata: hit.metadata,
            });
        }

        let far_hit = mutex_lock(&self.far, SOURCE, "get.far").get(key);
        match far_hit {
            Some(hit) => {
                let evicted =
                    mutex_lock(&self.near, SOURCE, "get.promote").put(key, hit.value.clone(), 0);
                if evicted.is_some() {
                    counter!(METRIC_EVICT, "tier" => Tier::Near.as_str()).increment(1);
                }
                self.counters.record_far_hit();
                counter!(METRIC_HIT, "tier" => Tier::Far.as_str()).increment(1);
                counter!(METRIC_PROMOTION).increment(1);
                Some(TieredHit {
                    value: hit.value,
                    tier: Tier::Far,
                    metadata: hit.metadata,
                })
            }
            None => {
                self.counters.record_miss();
                counter!(METRIC_MISS).increment(1);
                None
            }
        }
    }

    /// Live entries of each tier, most recently used first.
    pub fn contents(&self) -> TieredContents<V> {
        let near = mutex_lock(&self.near, SOURCE, "contents.near").entries();
        let far = mutex_lock(&self.far, SOURCE, "contents.far").entries();
        TieredContents { near, far }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn keys(entries: &[EntrySnapshot<u32>]) -> Vec<&str> {
        entries.iter().map(|entry| entry.key.as_str()).collect()
    }

    #[test]
    fn zero_capacity_is_rejected_at_construction() {
        assert!(TieredCache::<u32>::new(0, 10).is_err());
        assert!(TieredCache::<u32>::new(10, 0).is_err());
    }

    #[test]
    fn put_writes_through_to_both_tiers() {
        let cache = TieredCache::new(2, 3).expect("cache");
        cache.put("a", 1, 0);

        let contents = cache.contents();
        assert_eq!(keys(&contents.near), vec!["a"]);
        assert_eq!(keys(&contents.far), vec!["a"]);
    }

    #[test]
    fn far_hit_is_promoted_into_near() {
        let cache = TieredCache::new(1, 2).expect("cache");
        cache.put("a", 1, 0);
        cache.put("b", 2, 0);

        let first = cache.get("a").expect("far hit");
        assert_eq!(first.tier, Tier::Far);
        assert_eq!(first.value, 1);

        let second = cache.get("a").expect("near hit");
        assert_eq!(second.tier, Tier::Near);
    }

    #[test]
    fn promotion_drops_the_ttl() {
        let cache = TieredCache::new(1, 2).expect("cache");
        cache.put("a", 1, 60);
        cache.put("b", 2, 60);

        let far = cache.get("a").expect("far hit");
        assert!(far.metadata.ttl_remaining.is_some());

        let near = cache.get("a").expect("near hit");
        assert_eq!(near.tier, Tier::Near);
        assert!(near.metadata.never_expires());
    }

    #[test]
    fn hit_rate_counts_every_request_once() {
        let cache = TieredCache::new(1, 2).expect("cache");
        cache.put("a", 1, 0);
        cache.put("b", 2, 0);

        assert_eq!(cache.get("b").map(|hit| hit.tier), Some(Tier::Near));
        assert_eq!(cache.get("a").map(|hit| hit.tier), Some(Tier::Far));
        assert!(cache.get("x").is_none());
        assert!(cache.get("y").is_none());

        let stats = cache.stats();
        assert_eq!(stats.overall.requests, 4);
        assert_eq!(stats.overall.hits, 2);
        assert_eq!(stats.overall.misses, 2);
        assert_eq!(stats.overall.hit_rate, 50.0);
        assert_eq!(stats.near_cache.hits, 1);
        assert_eq!(stats.near_cache.hit_rate, 25.0);
        assert_eq!(stats.far_cache.hits, 1);
        assert_eq!(stats.far_cache.hit_rate, 25.0);
    }

    #[test]
    fn delete_reports_presence_in_either_tier() {
        let cache = TieredCache::new(1, 3).expect("cache");
        cache.put("a", 1, 0);
        cache.put("b", 2, 0);

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert!(cache.delete("b"));
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn walkthrough_with_small_tiers() {
        let cache = TieredCache::new(2, 3).expect("cache");
        cache.put("a", 1, 0);
        cache.put("b", 2, 0);
        cache.put("c", 3, 0);

        let contents = cache.contents();
        assert_eq!(keys(&contents.near), vec!["c", "b"]);
        assert_eq!(keys(&contents.far), vec!["c", "b", "a"]);

        assert_eq!(cache.get("a").map(|hit| hit.tier), Some(Tier::Far));
        let contents = cache.contents();
        assert_eq!(keys(&contents.near), vec!["a", "c"]);
        assert_eq!(keys(&contents.far), vec!["a", "c", "b"]);

        cache.clear();
        let contents = cache.contents();
        assert!(contents.near.is_empty());
        assert!(contents.far.is_empty());

        let stats = cache.stats();
        assert_eq!(stats.overall.requests, 0);
        assert_eq!(stats.overall.hits, 0);
        assert_eq!(stats.overall.misses, 0);
        assert_eq!(stats.near_cache.size, 0);
        assert_eq!(stats.far_cache.size, 0);
    }

    #[test]
    fn resize_discards_entries_of_the_resized_tier() {
        let cache = TieredCache::new(5, 10).expect("cache");
        for (n, key) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
            cache.put(key, n as u32, 0);
        }

        let snapshot = cache.set_capacity(Some(1), None, false).expect("resize");
        assert_eq!(
            snapshot,
            CapacitySnapshot {
                near_capacity: 1,
                far_capacity: 10,
            }
        );

        let stats = cache.stats();
        assert_eq!(stats.near_cache.size, 0);
        assert_eq!(stats.far_cache.size, 5);
    }

    #[test]
    fn resize_validates_before_touching_any_tier() {
        let cache = TieredCache::new(2, 4).expect("cache");
        cache.put("a", 1, 0);

        let err = cache.set_capacity(Some(3), Some(0), true).expect_err("zero far");
        assert!(matches!(err, CacheError::InvalidCapacity { .. }));
        assert!(cache.set_capacity(None, None, true).is_err());

        assert_eq!(
            cache.capacity(),
            CapacitySnapshot {
                near_capacity: 2,
                far_capacity: 4,
            }
        );
        assert_eq!(cache.stats().near_cache.size, 1);
    }

    #[test]
    fn resize_can_reset_stats() {
        let cache = TieredCache::new(2, 4).expect("cache");
        cache.put("a", 1, 0);
        cache.get("a");
        cache.get("missing");

        cache.set_capacity(None, Some(8), false).expect("resize");
        assert_eq!(cache.stats().overall.requests, 2);

        cache.set_capacity(None, Some(8), true).expect("resize");
        assert_eq!(cache.stats().overall.requests, 0);
    }

    #[test]
    fn sweep_reports_removals_per_tier() {
        let cache = TieredCache::new(2, 4).expect("cache");
        cache.put("a", 1, 30);
        cache.put("b", 2, 30);
        cache.put("c", 3, 0);
        cache.put("d", 4, 30);

        mutex_lock(&cache.near, SOURCE, "test").expire_now("d");
        for key in ["a", "b", "d"] {
            mutex_lock(&cache.far, SOURCE, "test").expire_now(key);
        }

        let report = cache.sweep_expired();
        assert_eq!(
            report,
            SweepReport {
                near_removed: 1,
                far_removed: 3,
                total: 4,
            }
        );
    }

    #[test]
    fn expired_near_entry_falls_through_to_far() {
        let cache = TieredCache::new(2, 2).expect("cache");
        cache.put("a", 1, 30);
        mutex_lock(&cache.near, SOURCE, "test").expire_now("a");

        let hit = cache.get("a").expect("far copy still live");
        assert_eq!(hit.tier, Tier::Far);
    }

    #[test]
    fn recovers_from_poisoned_tier_lock() {
        let cache = TieredCache::new(2, 2).expect("cache");

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache.near.lock().expect("near lock should be acquired");
            panic!("poison near tier lock");
        }));

        cache.put("a", 1, 0);
        assert_eq!(cache.get("a").map(|hit| hit.tier), Some(Tier::Near));
    }

    #[test]
    fn concurrent_promotions_do_not_lose_counts() {
        let cache = Arc::new(TieredCache::new(1, 8).expect("cache"));
        for n in 0..8u32 {
            cache.put(&format!("k{n}"), n, 0);
        }

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for round in 0..250u32 {
                        let key = format!("k{}", (round + worker) % 8);
                        assert!(cache.get(&key).is_some());
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker thread");
        }

        let stats = cache.stats();
        assert_eq!(stats.overall.requests, 1000);
        assert_eq!(stats.overall.hits, 1000);
        assert_eq!(stats.overall.misses, 0);
        assert_eq!(stats.near_cache.size, 1);
    }
}
