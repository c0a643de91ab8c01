pub mod config;
pub mod error;
pub mod notifications;
pub mod pipeline;
pub mod sweep;
pub mod tracing_config;
pub mod variants;
pub mod workers;

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::{event, Level};
use variant_worker_db::{ImageStore, PgImageStore};
use variant_worker_storage::BlobStore;

pub use error::{Error, Result};

use crate::{
    config::Config,
    notifications::Subscriber,
    pipeline::Pipeline,
    sweep::{run_sweeper, SweepConfig},
    workers::WorkerPool,
};

/// Run the worker until `shutdown` flips to true, then finish the queued images and return.
pub async fn run_worker(
    config: Config,
    shutdown: watch::Receiver<bool>,
) -> Result<(), eyre::Report> {
    let db = variant_worker_db::connect(
        config.database_url.as_str(),
        config.database_max_connections,
    )?;
    let store: Arc<dyn ImageStore> = Arc::new(PgImageStore::new(db));

    let operator = variant_worker_storage::create_operator(config.storage_config()?).await?;
    let blobs: Arc<dyn BlobStore> = Arc::new(operator);

    let pipeline = Arc::new(Pipeline::new(store.clone(), blobs, config.io_timeout()));
    let pool = WorkerPool::start(pipeline, config.worker_count, config.queue_size);

    let subscriber = Subscriber::new(&config.redis_url, config.image_channel.clone())?;
    let listener = tokio::spawn(subscriber.run(pool.sender(), shutdown.clone()));

    let sweeper = if config.sweep_interval_secs > 0 {
        let sweep_config = SweepConfig {
            interval: Duration::from_secs(config.sweep_interval_secs),
            grace: Duration::from_secs(config.sweep_grace_secs),
            batch_size: config.sweep_batch_size,
            io_timeout: config.io_timeout(),
        };
        Some(tokio::spawn(run_sweeper(
            store,
            pool.sender(),
            sweep_config,
            shutdown,
        )))
    } else {
        event!(Level::INFO, "Pending image sweep is disabled");
        None
    };

    listener.await?;
    if let Some(sweeper) = sweeper {
        sweeper.await?;
    }

    event!(Level::INFO, "Waiting for queued images to finish");
    pool.close().await;

    Ok(())
}
