use std::time::Duration;

use backon::ExponentialBackoff;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tracing::{event, instrument, Level};
use uuid::Uuid;

use crate::Result;

const MIN_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ProcessImageMessage {
    image_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid image id: {0}")]
    ImageId(#[from] uuid::Error),
}

/// Extract the image id from a `{"image_id": "..."}` notification.
pub fn parse_message(payload: &str) -> Result<Uuid, MessageError> {
    let message: ProcessImageMessage = serde_json::from_str(payload)?;
    let id = message.image_id.trim().parse::<Uuid>()?;
    Ok(id)
}

/// Why [forward_messages] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The message stream ran out, e.g. because the connection dropped.
    Closed,
    Shutdown,
    /// Nobody is processing the queue anymore.
    QueueClosed,
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Queue the image ids from a stream of notification payloads until the stream ends or shutdown
/// is requested. Payloads that can't be parsed are logged and dropped.
pub async fn forward_messages<S>(
    payloads: S,
    queue: &mpsc::Sender<Uuid>,
    shutdown: &mut watch::Receiver<bool>,
) -> StreamEnd
where
    S: Stream<Item = String>,
{
    futures::pin_mut!(payloads);

    loop {
        if shutdown_requested(shutdown) {
            return StreamEnd::Shutdown;
        }

        let payload = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    return StreamEnd::Shutdown;
                }
                continue;
            }
            payload = payloads.next() => payload,
        };

        let Some(payload) = payload else {
            return StreamEnd::Closed;
        };

        match parse_message(&payload) {
            Ok(image_id) => {
                event!(Level::DEBUG, %image_id, "Received image notification");
                if queue.send(image_id).await.is_err() {
                    return StreamEnd::QueueClosed;
                }
            }
            Err(e) => {
                event!(Level::WARN, error=%e, %payload, "Discarding notification");
            }
        }
    }
}

/// The delays to wait between attempts to reconnect to Redis.
pub fn reconnect_delays() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::default()
        .with_min_delay(MIN_RECONNECT_DELAY)
        .with_max_delay(MAX_RECONNECT_DELAY)
        .with_max_times(usize::MAX)
        .map(|delay| delay.min(MAX_RECONNECT_DELAY))
        .chain(std::iter::repeat(MAX_RECONNECT_DELAY))
}

/// Listens for upload notifications on a Redis pub/sub channel.
pub struct Subscriber {
    client: redis::Client,
    channel: String,
}

impl Subscriber {
    pub fn new(redis_url: &str, channel: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            channel: channel.into(),
        })
    }

    async fn subscribe(&self) -> Result<impl Stream<Item = String>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;

        let payloads = pubsub
            .into_on_message()
            .filter_map(|msg| async move {
                match msg.get_payload::<String>() {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        event!(Level::WARN, error=%e, "Discarding non-text notification");
                        None
                    }
                }
            });

        Ok(payloads)
    }

    /// Forward notifications to `queue` until shutdown, resubscribing whenever the connection drops.
    #[instrument(name = "subscriber", skip_all, fields(channel = %self.channel))]
    pub async fn run(self, queue: mpsc::Sender<Uuid>, mut shutdown: watch::Receiver<bool>) {
        let mut delays = reconnect_delays();

        loop {
            match self.subscribe().await {
                Ok(payloads) => {
                    event!(Level::INFO, "Subscribed to image notifications");
                    delays = reconnect_delays();
                    match forward_messages(payloads, &queue, &mut shutdown).await {
                        StreamEnd::Shutdown | StreamEnd::QueueClosed => break,
                        StreamEnd::Closed => {
                            event!(Level::WARN, "Notification subscription ended");
                        }
                    }
                }
                Err(e) => {
                    event!(Level::ERROR, error=%e, "Failed to subscribe to notifications");
                }
            }

            let delay = delays.next().unwrap_or(MAX_RECONNECT_DELAY);
            event!(Level::INFO, delay_ms = delay.as_millis() as u64, "Resubscribing after delay");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {}
            }

            if shutdown_requested(&shutdown) || shutdown.has_changed().is_err() {
                break;
            }
        }

        event!(Level::INFO, "Notification listener stopped");
    }
}
