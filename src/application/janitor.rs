//! Periodic sweep of abandoned uploads.

use crate::application::upload::UploadService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Sweep interval for a given session TTL: a tenth of it, within [1 min, 1 h].
pub fn sweep_interval(session_ttl: Duration) -> Duration {
    (session_ttl / 10).clamp(Duration::from_secs(60), Duration::from_secs(3600))
}

pub fn spawn(uploads: Arc<UploadService>, session_ttl: Duration) -> JoinHandle<()> {
    let every = sweep_interval(session_ttl);
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(every = ?every, ttl = ?session_ttl, "Upload janitor started");
        loop {
            ticker.tick().await;
            match uploads.sweep_abandoned(session_ttl).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Removed abandoned uploads"),
                Err(e) => error!(error = %e, "Upload sweep failed"),
            }
        }
    })
}
