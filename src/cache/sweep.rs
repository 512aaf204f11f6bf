use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::tiered::TieredCache;

/// Spawn a task that drops expired entries from both tiers every `period`.
///
/// The first sweep happens one full period after spawning. The task runs
/// until its handle is aborted.
pub fn spawn_sweeper<V>(cache: Arc<TieredCache<V>>, period: Duration) -> JoinHandle<()>
where
    V: Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let report = cache.sweep_expired();
            if report.total > 0 {
                info!(
                    near_removed = report.near_removed,
                    far_removed = report.far_removed,
                    total = report.total,
                    "swept expired cache entries"
                );
            } else {
                debug!("expiry sweep found nothing to remove");
            }
        }
    })
}
