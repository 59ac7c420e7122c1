//! Audit-event shipper
//!
//! Tails the upstream event API from the cursor position, forwards each
//! event to the collector, and advances the cursor to the maximum
//! timestamp of the events that were actually delivered. Delivery is
//! at-least-once: a cursor-write failure or a mid-batch sink failure
//! means some events may be sent again next tick, never skipped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::cursor::Cursor;
use crate::daemon::Daemon;
use crate::events::EventSource;
use crate::metrics;
use crate::sink::SplunkClient;
use crate::types::{SinkEvent, AUDIT_EVENT_SOURCETYPE};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(20);

/// Periodic event forwarder.
pub struct Shipper {
    deploy_env: String,

    cursor: Arc<dyn Cursor>,
    events: Arc<dyn EventSource>,
    sink: SplunkClient,

    interval: RwLock<Duration>,
    events_shipped: AtomicU64,
}

impl Shipper {
    /// Create a shipper labelling envelopes with `deploy_env`.
    pub fn new(
        deploy_env: impl Into<String>,
        cursor: Arc<dyn Cursor>,
        events: Arc<dyn EventSource>,
        sink: SplunkClient,
    ) -> Self {
        Self {
            deploy_env: deploy_env.into(),
            cursor,
            events,
            sink,
            interval: RwLock::new(DEFAULT_INTERVAL),
            events_shipped: AtomicU64::new(0),
        }
    }

    /// Change the tick period; effective no later than the next tick.
    pub fn set_interval(&self, interval: Duration) {
        *self.interval.write() = interval;
    }

    async fn ship_pending(&self) {
        let start = Instant::now();

        let mut latest = self.cursor.read().await;
        let batch = match self.events.events_after(latest).await {
            Ok(batch) => batch,
            Err(e) => {
                metrics::EVENT_FETCH_ERRORS_TOTAL.inc();
                tracing::error!(error = %e, "failed to list audit events");
                return;
            }
        };

        let mut shipped = 0usize;
        let mut all_events_shipped = true;

        for event in &batch {
            let envelope = SinkEvent {
                sourcetype: AUDIT_EVENT_SOURCETYPE,
                source: &self.deploy_env,
                event,
            };

            match self.sink.ship(&envelope).await {
                Ok(()) => {
                    // Batches are not assumed sorted: track the max, not
                    // the last.
                    latest = latest.max(event.timestamp);
                    shipped += 1;
                    self.events_shipped.fetch_add(1, Ordering::Relaxed);
                    metrics::EVENTS_SHIPPED_TOTAL.inc();
                }
                Err(e) => {
                    tracing::error!(event_id = %event.id, error = %e, "failed to ship event");
                    all_events_shipped = false;
                    break;
                }
            }
        }

        // Advance past what was delivered even when the tail of the batch
        // failed; the undelivered remainder is re-listed next tick.
        if let Err(e) = self.cursor.write(latest).await {
            tracing::error!(error = %e, "failed to update shipper cursor");
        }

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            events_shipped = shipped,
            total_events_shipped = self.events_shipped.load(Ordering::Relaxed),
            all_events_shipped,
            "shipped events"
        );
    }
}

#[async_trait]
impl Daemon for Shipper {
    fn name(&self) -> &'static str {
        "shipper"
    }

    fn interval(&self) -> Duration {
        *self.interval.read()
    }

    async fn tick(&self) {
        self.ship_pending().await;
    }
}
