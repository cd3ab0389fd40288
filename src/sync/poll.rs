//! Periodic stats poll, independent of the event stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::event::StatsPatch;
use crate::backend::Backend;

pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

pub fn spawn(
    backend: Arc<dyn Backend>,
    interval: Duration,
    tx: mpsc::Sender<StatsPatch>,
) -> JoinHandle<()> {
    tokio::spawn(poll_stats(backend, interval, tx))
}

async fn poll_stats(backend: Arc<dyn Backend>, interval: Duration, tx: mpsc::Sender<StatsPatch>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        match backend.fetch_stats().await {
            Ok(patch) => {
                if tx.send(patch).await.is_err() {
                    break;
                }
            }
            // Next tick retries
            Err(e) => debug!("stats poll failed: {}", e),
        }
    }
}
