use std::sync::Arc;

use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{event, Level};
use uuid::Uuid;

use crate::pipeline::Pipeline;

/// A fixed set of tasks pulling image ids off a bounded queue. Each task runs one image at a time.
pub struct WorkerPool {
    sender: mpsc::Sender<Uuid>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(pipeline: Arc<Pipeline>, worker_count: usize, queue_size: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_size.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..worker_count.max(1))
            .map(|worker| {
                let pipeline = pipeline.clone();
                let receiver = receiver.clone();
                tokio::spawn(async move {
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(image_id) = next else {
                            break;
                        };

                        let outcome = pipeline.process(image_id).await;
                        event!(Level::DEBUG, worker, %image_id, ?outcome, "Finished image");
                    }

                    event!(Level::DEBUG, worker, "Worker stopped");
                })
            })
            .collect();

        event!(Level::INFO, worker_count = worker_count.max(1), queue_size, "Started workers");
        Self { sender, workers }
    }

    /// A handle for adding image ids to the queue.
    pub fn sender(&self) -> mpsc::Sender<Uuid> {
        self.sender.clone()
    }

    /// Close the queue and wait for the workers to finish everything already in it. The queue
    /// only closes once every [sender](Self::sender) handle has also been dropped.
    pub async fn close(self) {
        drop(self.sender);
        for worker in self.workers {
            if let Err(e) = worker.await {
                event!(Level::ERROR, error=%e, "Worker task failed");
            }
        }
    }
}
