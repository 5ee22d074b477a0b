use std::sync::Arc;

use bunkride_store::RedisClient;
use bunkride_trips::repository::TripRepository;
use chrono::Utc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// Periodically delete departed trips. The read side filters by date on its
/// own, so a missed sweep only leaves dead rows, never stale listings.
pub async fn start_expiry_sweeper(
    trips: Arc<dyn TripRepository>,
    redis: Arc<RedisClient>,
    interval_seconds: u64,
) {
    let mut ticker = interval(Duration::from_secs(interval_seconds));
    info!("Expiry sweeper started, every {}s", interval_seconds);

    loop {
        ticker.tick().await;

        // One replica sweeps per window; losing the lock just means another
        // instance already did the work.
        match redis.acquire_sweep_lock(interval_seconds).await {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                // Sweep anyway: the delete is idempotent.
                error!("Sweep lock unavailable, sweeping without it: {}", e);
            }
        }

        match trips.sweep_expired(Utc::now()).await {
            Ok(deleted) if !deleted.is_empty() => {
                info!("Swept {} departed trips", deleted.len());
            }
            Ok(_) => {}
            Err(e) => error!("Expiry sweep failed: {}", e),
        }
    }
}
