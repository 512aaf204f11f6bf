//! lexicache cache system
//!
//! Two in-memory tiers in front of the word store:
//!
//! - **Near**: small, checked first, receives promotions from the far tier
//! - **Far**: larger, holds everything written through the cache
//!
//! Both tiers are LRU-bounded and support an optional TTL per entry. Expired
//! entries are dropped lazily on read and by a periodic sweep task.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! near_capacity = 20
//! far_capacity = 100
//! default_ttl_seconds = 300
//! sweep_interval_seconds = 300
//! ```

mod config;
mod error;
mod lock;
mod stats;
mod sweep;
mod tiered;
mod ttl;

pub use config::CacheConfig;
pub use error::CacheError;
pub use stats::{CacheStats, OverallStats, TierStats, hit_rate};
pub use sweep::spawn_sweeper;
pub use tiered::{CapacitySnapshot, SweepReport, Tier, TieredCache, TieredContents, TieredHit};
pub use ttl::{EntryMetadata, EntrySnapshot};
