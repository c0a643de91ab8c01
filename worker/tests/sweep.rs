use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use variant_worker::sweep::{run_sweeper, sweep_once, SweepConfig};
use variant_worker_db::{
    test::{original_image, FailPoint, MemoryImageStore},
    ImageVariant, ProcessingStatus,
};

fn config() -> SweepConfig {
    SweepConfig {
        interval: Duration::from_secs(3600),
        grace: Duration::from_secs(120),
        batch_size: 10,
        io_timeout: Duration::from_secs(5),
    }
}

/// Adds a pending original created `age_secs` ago and returns its id.
fn add_pending(store: &MemoryImageStore, name: &str, age_secs: i64) -> uuid::Uuid {
    let mut image = original_image(name);
    image.created_at = Utc::now() - chrono::Duration::seconds(age_secs);
    let id = image.id;
    store.insert_image(image);
    id
}

#[tokio::test]
async fn queues_stale_pending_originals() {
    let store = MemoryImageStore::new();
    let old = add_pending(&store, "a/old.png", 600);
    let older = add_pending(&store, "a/older.png", 3600);
    add_pending(&store, "a/fresh.png", 10);

    let mut processing = original_image("a/processing.png");
    processing.created_at = Utc::now() - chrono::Duration::hours(2);
    processing.processing_status = ProcessingStatus::Processing;
    store.insert_image(processing);

    let mut variant = original_image("a/variant.png");
    variant.created_at = Utc::now() - chrono::Duration::hours(2);
    variant.variant = ImageVariant::Thumb;
    store.insert_image(variant);

    let (queue, mut received) = mpsc::channel(10);
    let queued = sweep_once(&store, &queue, &config()).await.unwrap();
    assert_eq!(queued, 2);

    drop(queue);
    let mut ids = Vec::new();
    while let Some(id) = received.recv().await {
        ids.push(id);
    }
    assert_eq!(ids, vec![older, old]);
}

#[tokio::test]
async fn respects_batch_size() {
    let store = MemoryImageStore::new();
    for i in 0..5 {
        add_pending(&store, &format!("a/{i}.png"), 600 + i);
    }

    let (queue, _received) = mpsc::channel(10);
    let config = SweepConfig {
        batch_size: 3,
        ..config()
    };
    assert_eq!(sweep_once(&store, &queue, &config).await.unwrap(), 3);
}

#[tokio::test]
async fn store_errors_are_returned() {
    let store = MemoryImageStore::new();
    store.fail_always(FailPoint::ListStalePending);

    let (queue, _received) = mpsc::channel(10);
    assert!(sweep_once(&store, &queue, &config()).await.is_err());
}

#[tokio::test]
async fn runs_at_startup_and_stops_on_shutdown() {
    let store = Arc::new(MemoryImageStore::new());
    let stale = add_pending(&store, "a/stale.png", 600);

    let (queue, mut received) = mpsc::channel(10);
    let (shutdown_tx, shutdown) = watch::channel(false);
    let task = tokio::spawn(run_sweeper(store.clone(), queue, config(), shutdown));

    let id = tokio::time::timeout(Duration::from_secs(5), received.recv())
        .await
        .expect("sweep did not run at startup");
    assert_eq!(id, Some(stale));

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("sweep did not stop")
        .unwrap();

    // The sweeper dropped its queue handle when it stopped.
    assert!(received.recv().await.is_none());
}

#[tokio::test]
async fn shutdown_interrupts_a_sweep_blocked_on_a_full_queue() {
    let store = Arc::new(MemoryImageStore::new());
    for i in 0..3 {
        add_pending(&store, &format!("a/{i}.png"), 600 + i);
    }

    // Nobody reads from the queue, so the second send blocks forever.
    let (queue, mut received) = mpsc::channel(1);
    let (shutdown_tx, shutdown) = watch::channel(false);
    let task = tokio::spawn(run_sweeper(store.clone(), queue, config(), shutdown));

    let listed = store.clone();
    variant_worker_test::wait_for(|| {
        let store = listed.clone();
        async move { (store.calls(FailPoint::ListStalePending) > 0).then_some(()) }
    })
    .await
    .expect("sweep did not run at startup");
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("sweep did not stop while blocked on the queue")
        .unwrap();

    assert!(received.recv().await.is_some());
    assert!(received.recv().await.is_none());
}
