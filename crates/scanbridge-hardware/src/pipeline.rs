//! Byte pipeline of one open scanner session.
//!
//! The pipeline task owns the open device handle and its [`LineFramer`].
//! Raw chunks are framed as they arrive; completed lines are forwarded as
//! [`ScannerEvent::Line`]. While unterminated bytes are buffered a single
//! flush deadline is armed, and every new chunk re-arms it. When the
//! deadline passes the residue is emitted as a line.
//!
//! Cancelling the session token drops the device handle, the framer and any
//! pending flush without emitting the partial buffer.

use crate::devices::AnyScannerDevice;
use crate::traits::ScannerDevice;
use crate::watcher::ScannerEvent;
use scanbridge_core::ScanLine;
use scanbridge_protocol::{FramerConfig, LineFramer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Why a pipeline task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineExit {
    /// The session was closed by the watcher.
    Cancelled,
    /// The device stopped delivering data.
    ReadFailed(String),
    /// Nobody is listening for events any more.
    ConsumerGone,
}

pub(crate) struct ScanPipeline {
    device: AnyScannerDevice,
    framer: LineFramer,
    events: mpsc::Sender<ScannerEvent>,
    cancel: CancellationToken,
}

impl ScanPipeline {
    pub(crate) fn new(
        device: AnyScannerDevice,
        framer: FramerConfig,
        events: mpsc::Sender<ScannerEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            device,
            framer: LineFramer::with_config(framer),
            events,
            cancel,
        }
    }

    pub(crate) fn spawn(self) -> JoinHandle<PipelineExit> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> PipelineExit {
        let flush_delay = self.framer.config().flush_delay;
        let mut flush_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    debug!(
                        path = %self.device.path(),
                        pending = self.framer.pending_len(),
                        "scan pipeline cancelled"
                    );
                    return PipelineExit::Cancelled;
                }

                chunk = self.device.read_chunk() => match chunk {
                    Ok(bytes) => {
                        trace!(path = %self.device.path(), len = bytes.len(), "chunk received");
                        self.framer.feed(&bytes);

                        while let Some(line) = self.framer.next_line() {
                            if let Err(exit) = self.emit(line).await {
                                return exit;
                            }
                        }

                        flush_deadline = self
                            .framer
                            .has_pending()
                            .then(|| Instant::now() + flush_delay);
                    }
                    Err(e) => {
                        warn!(path = %self.device.path(), error = %e, "scanner read failed");
                        return PipelineExit::ReadFailed(e.to_string());
                    }
                },

                () = sleep_until(flush_deadline.unwrap_or_else(Instant::now)),
                    if flush_deadline.is_some() =>
                {
                    flush_deadline = None;
                    if let Some(line) = self.framer.flush() {
                        debug!(path = %self.device.path(), "flushed unterminated line");
                        if let Err(exit) = self.emit(line).await {
                            return exit;
                        }
                    }
                }
            }
        }
    }

    /// Forward a line. A full channel never outlives cancellation.
    async fn emit(&self, line: ScanLine) -> Result<(), PipelineExit> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(PipelineExit::Cancelled),
            sent = self.events.send(ScannerEvent::Line(line)) => {
                sent.map_err(|_| PipelineExit::ConsumerGone)
            }
        }
    }
}
