//! Device watcher: discovery, connection and reconnection of the scanner.
//!
//! The watcher polls HID enumeration on a fixed interval and drives the
//! [`PresenceMachine`]. A single task owns the machine, the open device and
//! the session's byte pipeline, so poll ticks and handle teardown never
//! race.
//!
//! ```text
//!  poll tick ──► enumerate ──► filter ──► first match
//!                                              │
//!       ┌──────────────────────────────────────┤
//!       ▼                                      ▼
//!  session lost?                        no session: open
//!  (device gone / pipeline dead)        ├─ ok:  Connected | Reconnected
//!  └─► close, Disconnected              └─ err: stay Disconnected, retry
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use scanbridge_hardware::devices::AnyHidTransport;
//! use scanbridge_hardware::mock::MockHidTransport;
//! use scanbridge_hardware::watcher::{DeviceWatcher, ScannerEvent, WatcherConfig};
//! use scanbridge_hardware::{DeviceFilter, ProductSelector};
//!
//! # async fn example() -> scanbridge_hardware::Result<()> {
//! let (transport, _handle) = MockHidTransport::new();
//! let filter = DeviceFilter::new(0x0c2e, ProductSelector::Id(0x0b61));
//! let watcher = DeviceWatcher::new(AnyHidTransport::Mock(transport), WatcherConfig::new(filter));
//!
//! let mut handle = watcher.start();
//! while let Some(event) = handle.recv().await {
//!     if let ScannerEvent::Line(line) = event {
//!         println!("scanned {line}");
//!     }
//! }
//! handle.shutdown().await
//! # }
//! ```

use crate::devices::{AnyHidTransport, AnyScannerDevice};
use crate::error::Result;
use crate::pipeline::{PipelineExit, ScanPipeline};
use crate::presence::{ConnectionState, PresenceMachine};
use crate::traits::HidTransport;
use crate::types::{DeviceDescriptor, DeviceFilter};
use scanbridge_core::ScanLine;
use scanbridge_core::constants::POLL_INTERVAL_MS;
use scanbridge_protocol::FramerConfig;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default capacity of the watcher event channel.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Event emitted by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScannerEvent {
    /// First sighting of this device (or a different one than before).
    Connected(DeviceDescriptor),
    /// The previously connected device came back.
    Reconnected(DeviceDescriptor),
    /// The open device went away; queued work is unaffected.
    Disconnected(DeviceDescriptor),
    /// One framed scan line from the open device.
    Line(ScanLine),
}

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub filter: DeviceFilter,
    pub poll_interval: Duration,
    pub framer: FramerConfig,
    /// Where to write the matched-device snapshot on connection.
    pub devices_path: Option<PathBuf>,
    pub channel_capacity: usize,
}

impl WatcherConfig {
    pub fn new(filter: DeviceFilter) -> Self {
        Self {
            filter,
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            framer: FramerConfig::default(),
            devices_path: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_framer(mut self, framer: FramerConfig) -> Self {
        self.framer = framer;
        self
    }

    pub fn with_devices_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.devices_path = Some(path.into());
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

/// Watches for the configured scanner.
pub struct DeviceWatcher {
    transport: AnyHidTransport,
    config: WatcherConfig,
}

impl DeviceWatcher {
    pub fn new(transport: AnyHidTransport, config: WatcherConfig) -> Self {
        Self { transport, config }
    }

    /// Spawn the watch loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> WatcherHandle {
        let (events_tx, events_rx) = mpsc::channel(self.config.channel_capacity);
        let cancel = CancellationToken::new();

        let watch = WatchLoop {
            transport: self.transport,
            config: self.config,
            machine: PresenceMachine::new(),
            session: None,
            events: events_tx,
            cancel: cancel.clone(),
        };

        WatcherHandle {
            events: events_rx,
            cancel,
            task: tokio::spawn(watch.run()),
        }
    }
}

/// Handle to a running watcher.
pub struct WatcherHandle {
    events: mpsc::Receiver<ScannerEvent>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Receive the next event. Returns `None` once the watcher has stopped.
    pub async fn recv(&mut self) -> Option<ScannerEvent> {
        self.events.recv().await
    }

    /// Token that stops the watcher when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request the watcher to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop polling, close the open device and wait for the task to end.
    ///
    /// Events still queued in the channel are discarded. Task panics are
    /// logged, never propagated.
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            mut events,
            cancel,
            task,
        } = self;

        cancel.cancel();
        events.close();
        if let Err(e) = task.await
            && e.is_panic()
        {
            error!(error = %e, "device watcher task panicked");
        }
        Ok(())
    }
}

struct ActiveSession {
    descriptor: DeviceDescriptor,
    cancel: CancellationToken,
    task: JoinHandle<PipelineExit>,
}

impl ActiveSession {
    fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    async fn close(self) -> Option<PipelineExit> {
        self.cancel.cancel();
        match self.task.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                error!(path = %self.descriptor.path, error = %e, "scan pipeline task failed");
                None
            }
        }
    }
}

struct WatchLoop {
    transport: AnyHidTransport,
    config: WatcherConfig,
    machine: PresenceMachine,
    session: Option<ActiveSession>,
    events: mpsc::Sender<ScannerEvent>,
    cancel: CancellationToken,
}

impl WatchLoop {
    async fn run(mut self) {
        info!(
            filter = %self.config.filter,
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "device watcher started"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.poll().await.is_break() {
                debug!("event channel closed, stopping watcher");
                break;
            }
        }

        if let Some(session) = self.session.take() {
            session.close().await;
        }
        info!("device watcher stopped");
    }

    async fn poll(&mut self) -> ControlFlow<()> {
        let matches = match self.transport.enumerate().await {
            Ok(devices) => self.config.filter.select(devices),
            Err(e) => {
                warn!(error = %e, "HID enumeration failed, treating as no device");
                Vec::new()
            }
        };

        let lost = self.session.as_ref().is_some_and(|session| {
            !session.is_alive() || !matches.iter().any(|d| d.path == session.descriptor.path)
        });
        if lost {
            if let Some(session) = self.session.take() {
                self.end_session(session).await?;
            }
        }

        if self.session.is_none() {
            if let Some(descriptor) = matches.first() {
                if matches.len() > 1 {
                    debug!(
                        count = matches.len(),
                        path = %descriptor.path,
                        "multiple devices match, using the first enumerated"
                    );
                }
                self.begin_session(descriptor, &matches).await?;
            }
        }

        ControlFlow::Continue(())
    }

    async fn begin_session(
        &mut self,
        descriptor: &DeviceDescriptor,
        matches: &[DeviceDescriptor],
    ) -> ControlFlow<()> {
        let device = match self.transport.open(descriptor).await {
            Ok(device) => device,
            Err(e) => {
                warn!(path = %descriptor.path, error = %e, "failed to open scanner, will retry");
                return ControlFlow::Continue(());
            }
        };

        let transition = match self.machine.device_opened(descriptor) {
            Ok(transition) => transition,
            Err(e) => {
                error!(error = %e, "presence machine rejected connection");
                return ControlFlow::Continue(());
            }
        };

        info!(
            state = %transition.to,
            path = %descriptor.path,
            serial = descriptor.serial_number.as_deref().unwrap_or("-"),
            product = descriptor.display_name(),
            "scanner {}",
            transition.to
        );

        let event = match transition.to {
            ConnectionState::Reconnected => ScannerEvent::Reconnected(descriptor.clone()),
            _ => ScannerEvent::Connected(descriptor.clone()),
        };
        self.emit(event).await?;

        self.session = Some(self.spawn_pipeline(descriptor.clone(), device));

        if let Some(path) = &self.config.devices_path {
            if let Err(e) = write_snapshot(path, matches).await {
                warn!(path = %path.display(), error = %e, "failed to write device snapshot");
            }
        }

        ControlFlow::Continue(())
    }

    fn spawn_pipeline(
        &self,
        descriptor: DeviceDescriptor,
        device: AnyScannerDevice,
    ) -> ActiveSession {
        let cancel = self.cancel.child_token();
        let task = ScanPipeline::new(
            device,
            self.config.framer,
            self.events.clone(),
            cancel.clone(),
        )
        .spawn();

        ActiveSession {
            descriptor,
            cancel,
            task,
        }
    }

    async fn end_session(&mut self, session: ActiveSession) -> ControlFlow<()> {
        let descriptor = session.descriptor.clone();
        let exit = session.close().await;

        match self.machine.device_lost() {
            Ok(_) => info!(
                path = %descriptor.path,
                serial = descriptor.serial_number.as_deref().unwrap_or("-"),
                reason = ?exit,
                "scanner disconnected"
            ),
            Err(e) => error!(error = %e, "presence machine rejected disconnection"),
        }

        self.emit(ScannerEvent::Disconnected(descriptor)).await
    }

    /// Breaks when the consumer is gone or the watcher is cancelled while
    /// the channel is full.
    async fn emit(&self, event: ScannerEvent) -> ControlFlow<()> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => ControlFlow::Break(()),
            sent = self.events.send(event) => match sent {
                Ok(()) => ControlFlow::Continue(()),
                Err(_) => ControlFlow::Break(()),
            },
        }
    }
}

/// Persist the matched descriptors for diagnostics.
async fn write_snapshot(path: &Path, devices: &[DeviceDescriptor]) -> Result<()> {
    let json = serde_json::to_vec_pretty(devices)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
