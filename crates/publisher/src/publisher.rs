//! The outbox poll-and-dispatch loop.

use std::sync::Arc;
use std::time::Instant;

use domain::OutboxEvent;
use futures_util::StreamExt;
use futures_util::stream;
use store::{OutboxStore, StoreError};
use tokio::sync::watch;

use crate::config::PublisherConfig;

/// Upper bound on concurrent dispatches within one poll cycle.
pub const DISPATCH_CONCURRENCY: usize = 5;

/// Polls the outbox and relays pending events to their target services.
///
/// The loop is restartable: it keeps no state outside the outbox table, so a
/// crashed process simply rescans on the next start. Delivery order between
/// sagas is not guaranteed; within a saga the protocol itself orders events,
/// because a successor event is only appended after the predecessor's
/// participant call succeeded.
pub struct OutboxPublisher<S> {
    store: Arc<S>,
    client: reqwest::Client,
    config: PublisherConfig,
}

impl<S: OutboxStore + 'static> OutboxPublisher<S> {
    pub fn new(store: Arc<S>, config: PublisherConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            store,
            client,
            config,
        })
    }

    /// Runs the poll loop until `shutdown` flips to `true` (or its sender is
    /// dropped). In-flight dispatches finish before the loop exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            request_timeout_ms = self.config.request_timeout.as_millis() as u64,
            "outbox publisher started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.poll_once().await {
                Ok(0) => {}
                Ok(dispatched) => {
                    tracing::debug!(events = dispatched, "outbox batch dispatched");
                }
                Err(error) => {
                    tracing::error!(%error, "outbox poll cycle failed");
                }
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("outbox publisher stopped");
    }

    /// One poll cycle: fetch a batch and dispatch it with bounded fan-out.
    /// Returns the number of events dispatched (successfully or not).
    pub async fn poll_once(&self) -> Result<usize, StoreError> {
        let events = self.store.find_unpublished(self.config.batch_size).await?;
        if events.is_empty() {
            return Ok(0);
        }

        let count = events.len();
        stream::iter(events.into_iter().map(|event| self.dispatch(event)))
            .buffer_unordered(DISPATCH_CONCURRENCY)
            .collect::<Vec<()>>()
            .await;

        Ok(count)
    }

    /// Delivers one event and persists the resulting publish metadata.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type, target = %event.target_service))]
    async fn dispatch(&self, mut event: OutboxEvent) {
        let url = format!(
            "{}/api/v1{}",
            self.config.urls.base(event.target_service),
            event.target_endpoint
        );
        let key = event.outbound_idempotency_key();
        let started = Instant::now();

        let outcome = match self
            .client
            .post(&url)
            .header("idempotency-key", key.as_str())
            .json(&event.payload)
            .send()
            .await
        {
            // Delivered iff 2xx and the body is parseable JSON. A
            // `success:false` envelope still counts: the receiver saw the
            // event and rejected it for business reasons, so retrying is
            // pointless.
            Ok(response) if response.status().is_success() => response
                .json::<serde_json::Value>()
                .await
                .map(|_| ())
                .map_err(|e| format!("invalid response body: {e}")),
            Ok(response) => Err(format!("HTTP {}", response.status())),
            Err(error) => Err(error.to_string()),
        };

        metrics::histogram!("outbox_dispatch_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => {
                event.mark_published();
                metrics::counter!("outbox_events_published").increment(1);
                tracing::debug!(%url, attempts = event.publish_attempts + 1, "event published");
            }
            Err(error) => {
                event.record_failure(error.clone());
                metrics::counter!("outbox_publish_failures").increment(1);
                if event.is_terminally_failed() {
                    metrics::counter!("outbox_events_terminally_failed").increment(1);
                    tracing::error!(
                        %url,
                        attempts = event.publish_attempts,
                        %error,
                        "outbox event exhausted its retries"
                    );
                } else {
                    tracing::warn!(%url, attempts = event.publish_attempts, %error, "publish attempt failed");
                }
            }
        }

        if let Err(error) = self.store.save_publish_state(&event).await {
            // The event stays unpublished and will be re-dispatched; the
            // receiver's idempotency check absorbs the replay.
            tracing::error!(%error, "failed to persist publish state");
        }
    }
}
