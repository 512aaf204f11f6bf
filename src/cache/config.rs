//! Cache configuration.
//!
//! Tier capacities, default entry TTL and the expiry sweep period, read from
//! the `[cache]` section of `lexicache.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_NEAR_CAPACITY: usize = 20;
const DEFAULT_FAR_CAPACITY: usize = 100;
const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries in the near tier.
    pub near_capacity: usize,
    /// Maximum entries in the far tier.
    pub far_capacity: usize,
    /// TTL applied to warmed and read-through entries.
    pub default_ttl_seconds: u64,
    /// Period of the background expiry sweep.
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            near_capacity: DEFAULT_NEAR_CAPACITY,
            far_capacity: DEFAULT_FAR_CAPACITY,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            near_capacity: settings.near_capacity.get(),
            far_capacity: settings.far_capacity.get(),
            default_ttl_seconds: settings.default_ttl_seconds.get(),
            sweep_interval_seconds: settings.sweep_interval_seconds.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the near capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn near_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.near_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the far capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn far_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.far_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Default TTL as the signed seconds value the tiers accept.
    pub fn default_ttl(&self) -> i64 {
        i64::try_from(self.default_ttl_seconds).unwrap_or(i64::MAX)
    }

    /// Sweep period, never shorter than one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.near_capacity, 20);
        assert_eq!(config.far_capacity, 100);
        assert_eq!(config.default_ttl_seconds, 300);
        assert_eq!(config.sweep_interval_seconds, 300);
        assert_eq!(config.default_ttl(), 300);
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            near_capacity: 0,
            far_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.near_capacity_non_zero().get(), 1);
        assert_eq!(config.far_capacity_non_zero().get(), 1);
    }

    #[test]
    fn oversized_ttl_saturates() {
        let config = CacheConfig {
            default_ttl_seconds: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.default_ttl(), i64::MAX);
    }

    #[test]
    fn zero_sweep_interval_is_raised_to_one_second() {
        let config = CacheConfig {
            sweep_interval_seconds: 0,
            ..Default::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
