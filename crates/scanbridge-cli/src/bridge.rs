//! Glue between the device watcher and the delivery queue.
//!
//! Each framed line is validated, logged and enqueued for the configured
//! endpoint. Presence events only need logging here; the watcher already
//! manages the device itself.

use scanbridge_core::DeliveryPayload;
use scanbridge_hardware::{ScannerEvent, WatcherHandle};
use scanbridge_network::Url;
use scanbridge_protocol::validate;
use scanbridge_storage::QueueStore;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const ENQUEUE_ATTEMPTS: u32 = 3;
const ENQUEUE_RETRY_DELAY: Duration = Duration::from_millis(200);

pub struct ScanBridge {
    queue: QueueStore,
    endpoint: Url,
}

impl ScanBridge {
    pub fn new(queue: QueueStore, endpoint: Url) -> Self {
        Self { queue, endpoint }
    }

    /// Forward watcher events until cancelled or the watcher stops.
    ///
    /// The event being handled when cancellation arrives is finished first.
    pub async fn run(&self, watcher: &mut WatcherHandle, cancel: &CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = watcher.recv() => match event {
                    Some(event) => event,
                    None => {
                        warn!("device watcher stopped unexpectedly");
                        break;
                    }
                },
            };
            self.handle(event).await;
        }
    }

    async fn handle(&self, event: ScannerEvent) {
        match event {
            ScannerEvent::Line(line) => {
                let result = validate(&line);
                info!(
                    symbology = %result.symbology,
                    valid = result.valid,
                    barcode = %result.barcode,
                    error = result.error.as_deref(),
                    "scan validated"
                );
                self.enqueue(&DeliveryPayload::from(&result)).await;
            }
            ScannerEvent::Connected(device) | ScannerEvent::Reconnected(device) => {
                debug!(path = %device.path, "scanner ready");
            }
            ScannerEvent::Disconnected(device) => {
                debug!(path = %device.path, "scanner gone, waiting for it to return");
            }
            other => debug!(event = ?other, "ignoring watcher event"),
        }
    }

    async fn enqueue(&self, payload: &DeliveryPayload) {
        for attempt in 1..=ENQUEUE_ATTEMPTS {
            match self.queue.enqueue(self.endpoint.as_str(), payload).await {
                Ok(entry) => {
                    info!(entry_id = entry.id, barcode = %payload.barcode, "scan enqueued");
                    return;
                }
                Err(e) if attempt < ENQUEUE_ATTEMPTS => {
                    warn!(attempt, error = %e, "failed to enqueue scan, retrying");
                    tokio::time::sleep(ENQUEUE_RETRY_DELAY).await;
                }
                Err(e) => {
                    error!(
                        attempt,
                        barcode = %payload.barcode,
                        error = %e,
                        "failed to enqueue scan, dropping it"
                    );
                }
            }
        }
    }
}
