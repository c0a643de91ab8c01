use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{event, instrument, Level};
use uuid::Uuid;
use variant_worker_db::ImageStore;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub interval: Duration,
    /// How long an image must have been pending before the sweep picks it up.
    pub grace: Duration,
    pub batch_size: i64,
    pub io_timeout: Duration,
}

/// Queue up to `batch_size` originals that have been pending for longer than the grace period.
/// Returns how many were queued.
#[instrument(skip_all)]
pub async fn sweep_once(
    store: &dyn ImageStore,
    queue: &mpsc::Sender<Uuid>,
    config: &SweepConfig,
) -> Result<usize> {
    let grace = chrono::Duration::from_std(config.grace).unwrap_or_else(|_| chrono::Duration::zero());
    let cutoff = Utc::now() - grace;

    let ids = tokio::time::timeout(
        config.io_timeout,
        store.list_stale_pending(cutoff, config.batch_size),
    )
    .await
    .map_err(|_| Error::Timeout("list stale images"))??;

    let mut queued = 0;
    for image_id in ids {
        if queue.send(image_id).await.is_err() {
            break;
        }
        queued += 1;
    }

    Ok(queued)
}

/// Run [sweep_once] at startup and then on every interval until shutdown.
pub async fn run_sweeper(
    store: Arc<dyn ImageStore>,
    queue: mpsc::Sender<Uuid>,
    config: SweepConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    event!(
        Level::INFO,
        interval_secs = config.interval.as_secs(),
        grace_secs = config.grace.as_secs(),
        "Starting pending image sweep"
    );

    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                // A full queue blocks the sweep, so shutdown has to be able to interrupt it.
                // Images it did not get to stay pending for the next sweep.
                tokio::select! {
                    result = sweep_once(store.as_ref(), &queue, &config) => match result {
                        Ok(0) => {}
                        Ok(count) => event!(Level::INFO, count, "Queued pending images"),
                        Err(e) => event!(Level::WARN, error=%e, "Sweep failed, will retry next interval"),
                    },
                    _ = shutdown.changed() => break,
                }
            }
        }
    }

    event!(Level::INFO, "Sweep stopped");
}
