//! Single-tier LRU cache with optional per-entry time-to-live.
//!
//! Entries live in an arena of slots. The recency list is threaded through
//! the slots by index (`prev`/`next`), with two reserved sentinel slots
//! marking the head (most recently used) and the tail (least recently used).
//! The key index maps each key to its slot, so lookup, promotion to the head,
//! unlinking and tail eviction are all O(1).

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;

use super::error::CacheError;

const HEAD: usize = 0;
const TAIL: usize = 1;
const SENTINELS: usize = 2;

/// Upper bound on slots reserved up front; larger tiers grow on demand.
const PREALLOCATE_LIMIT: usize = 4096;

/// Expiry information reported alongside a cached value.
///
/// Both fields are `None` for entries that never expire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    /// Whole seconds until expiry, rounded down.
    pub ttl_remaining: Option<u64>,
}

impl EntryMetadata {
    fn at(expiry: Option<&Expiry>, now: Instant) -> Self {
        match expiry {
            Some(expiry) => Self {
                expires_at: Some(expiry.expires_at),
                ttl_remaining: Some(expiry.remaining_seconds(now)),
            },
            None => Self {
                expires_at: None,
                ttl_remaining: None,
            },
        }
    }

    pub fn never_expires(&self) -> bool {
        self.expires_at.is_none()
    }
}

/// A value returned by [`TtlCache::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<V> {
    pub value: V,
    pub metadata: EntryMetadata,
}

/// A live entry as listed by [`TtlCache::entries`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySnapshot<V> {
    pub key: String,
    pub value: V,
    #[serde(flatten)]
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, Copy)]
struct Expiry {
    deadline: Instant,
    expires_at: OffsetDateTime,
}

impl Expiry {
    /// `None` for non-positive TTLs and for TTLs too large to represent.
    fn after_seconds(ttl_seconds: i64) -> Option<Self> {
        if ttl_seconds <= 0 {
            return None;
        }

        let deadline = Instant::now().checked_add(Duration::from_secs(ttl_seconds.unsigned_abs()))?;
        let expires_at =
            OffsetDateTime::now_utc().checked_add(time::Duration::seconds(ttl_seconds))?;

        Some(Self {
            deadline,
            expires_at,
        })
    }

    fn has_passed(&self, now: Instant) -> bool {
        now > self.deadline
    }

    fn remaining_seconds(&self, now: Instant) -> u64 {
        self.deadline.saturating_duration_since(now).as_secs()
    }
}

#[derive(Debug)]
struct Entry<V> {
    key: String,
    value: V,
    expiry: Option<Expiry>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expiry.is_some_and(|expiry| expiry.has_passed(now))
    }
}

#[derive(Debug)]
struct Slot<V> {
    entry: Option<Entry<V>>,
    prev: usize,
    next: usize,
}

impl<V> Slot<V> {
    fn sentinel() -> Self {
        Self {
            entry: None,
            prev: HEAD,
            next: TAIL,
        }
    }
}

/// Capacity-bounded LRU cache keyed by string with optional expiry.
///
/// Not synchronised; [`super::TieredCache`] wraps each tier in its own mutex.
#[derive(Debug)]
pub struct TtlCache<V> {
    tier: &'static str,
    capacity: NonZeroUsize,
    index: HashMap<String, usize>,
    slots: Vec<Slot<V>>,
    free: Vec<usize>,
}

impl<V> TtlCache<V> {
    /// Create a cache whose log events carry the given tier label.
    fn for_tier(tier: &'static str, capacity: NonZeroUsize) -> Self {
        let reserve = capacity.get().min(PREALLOCATE_LIMIT);
        let mut slots = Vec::with_capacity(SENTINELS + reserve);
        slots.push(Slot::sentinel());
        slots.push(Slot::sentinel());

        Self {
            tier,
            capacity,
            index: HashMap::with_capacity(reserve),
            slots,
            free: Vec::new(),
        }
    }

    /// Build a cache from an unchecked capacity, rejecting zero.
    pub fn with_capacity(tier: &'static str, capacity: usize) -> Result<Self, CacheError> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            CacheError::invalid_capacity(format!("{tier} capacity must be a positive integer"))
        })?;
        Ok(Self::for_tier(tier, capacity))
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Insert or replace `key`.
    ///
    /// A non-positive `ttl_seconds` stores the entry without expiry. Replacing
    /// an existing key never evicts. Inserting a new key into a full cache
    /// evicts the least recently used entry first; its key is returned.
    pub fn put(&mut self, key: &str, value: V, ttl_seconds: i64) -> Option<String> {
        let expiry = Expiry::after_seconds(ttl_seconds);

        if let Some(&slot) = self.index.get(key) {
            if let Some(entry) = self.slots[slot].entry.as_mut() {
                entry.value = value;
                entry.expiry = expiry;
            }
            self.unlink(slot);
            self.push_front(slot);
            if expiry.is_some() {
                debug!(tier = self.tier, key, ttl_seconds, "updated cache entry with ttl");
            }
            return None;
        }

        let evicted = if self.index.len() >= self.capacity.get() {
            self.evict_lru()
        } else {
            None
        };

        let slot = self.allocate(Entry {
            key: key.to_string(),
            value,
            expiry,
        });
        self.push_front(slot);
        self.index.insert(key.to_string(), slot);

        if expiry.is_some() {
            debug!(tier = self.tier, key, ttl_seconds, "inserted cache entry with ttl");
        }

        evicted
    }

    pub fn delete(&mut self, key: &str) -> bool {
        match self.index.get(key) {
            Some(&slot) => {
                self.remove_slot(slot);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.free.clear();
        self.slots.truncate(SENTINELS);
        self.slots[HEAD] = Slot::sentinel();
        self.slots[TAIL] = Slot::sentinel();
    }

    /// Remove every expired entry and return how many were dropped.
    pub fn sweep_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<usize> = self
            .index
            .values()
            .copied()
            .filter(|&slot| {
                self.slots[slot]
                    .entry
                    .as_ref()
                    .is_some_and(|entry| entry.is_expired(now))
            })
            .collect();

        for &slot in &expired {
            self.remove_slot(slot);
        }

        expired.len()
    }

    /// Keys from most to least recently used, including expired entries.
    #[cfg(test)]
    fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.index.len());
        let mut cursor = self.slots[HEAD].next;
        while cursor != TAIL {
            if let Some(entry) = self.slots[cursor].entry.as_ref() {
                keys.push(entry.key.clone());
            }
            cursor = self.slots[cursor].next;
        }
        keys
    }

    fn evict_lru(&mut self) -> Option<String> {
        let slot = self.slots[TAIL].prev;
        if slot == HEAD {
            return None;
        }

        let entry = self.remove_slot(slot)?;
        debug!(tier = self.tier, key = %entry.key, "evicted least recently used entry");
        Some(entry.key)
    }

    fn allocate(&mut self, entry: Entry<V>) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot].entry = Some(entry);
                slot
            }
            None => {
                self.slots.push(Slot {
                    entry: Some(entry),
                    prev: HEAD,
                    next: TAIL,
                });
                self.slots.len() - 1
            }
        }
    }

    fn remove_slot(&mut self, slot: usize) -> Option<Entry<V>> {
        self.unlink(slot);
        let entry = self.slots[slot].entry.take()?;
        self.free.push(slot);
        self.index.remove(&entry.key);
        Some(entry)
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.slots[slot].prev, self.slots[slot].next);
        self.slots[prev].next = next;
        self.slots[next].prev = prev;
    }

    fn push_front(&mut self, slot: usize) {
        let first = self.slots[HEAD].next;
        self.slots[slot].prev = HEAD;
        self.slots[slot].next = first;
        self.slots[first].prev = slot;
        self.slots[HEAD].next = slot;
    }

    #[cfg(test)]
    pub(crate) fn expire_now(&mut self, key: &str) -> bool {
        let Some(&slot) = self.index.get(key) else {
            return false;
        };
        let Some(entry) = self.slots[slot].entry.as_mut() else {
            return false;
        };
        let now = Instant::now();
        entry.expiry = Some(Expiry {
            deadline: now.checked_sub(Duration::from_millis(1)).unwrap_or(now),
            expires_at: OffsetDateTime::now_utc(),
        });
        true
    }
}

impl<V: Clone> TtlCache<V> {
    /// Look up `key`, marking it most recently used.
    ///
    /// Expired entries are removed on access and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<CacheHit<V>> {
        let slot = *self.index.get(key)?;
        let now = Instant::now();

        let expired = self.slots[slot]
            .entry
            .as_ref()
            .is_some_and(|entry| entry.is_expired(now));
        if expired {
            self.remove_slot(slot);
            debug!(tier = self.tier, key, "cache entry expired");
            return None;
        }

        self.unlink(slot);
        self.push_front(slot);

        let entry = self.slots[slot].entry.as_ref()?;
        Some(CacheHit {
            value: entry.value.clone(),
            metadata: EntryMetadata::at(entry.expiry.as_ref(), now),
        })
    }

    /// List live entries from most to least recently used.
    ///
    /// Expired entries met along the way are removed. Recency is unchanged.
    pub fn entries(&mut self) -> Vec<EntrySnapshot<V>> {
        let now = Instant::now();
        let mut live = Vec::with_capacity(self.index.len());
        let mut expired = Vec::new();

        let mut cursor = self.slots[HEAD].next;
        while cursor != TAIL {
            if let Some(entry) = self.slots[cursor].entry.as_ref() {
                if entry.is_expired(now) {
                    expired.push(cursor);
                } else {
                    live.push(EntrySnapshot {
                        key: entry.key.clone(),
                        value: entry.value.clone(),
                        metadata: EntryMetadata::at(entry.expiry.as_ref(), now),
                    });
                }
            }
            cursor = self.slots[cursor].next;
        }

        for &slot in &expired {
            self.remove_slot(slot);
        }
        if !expired.is_empty() {
            debug!(
                tier = self.tier,
                removed = expired.len(),
                "removed expired entries while listing"
            );
        }

        live
    }
}
