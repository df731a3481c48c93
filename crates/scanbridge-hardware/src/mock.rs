//! In-memory HID transport for testing and development.
//!
//! [`MockHidTransport`] serves a device list controlled through a
//! [`MockHidHandle`]: tests plug and unplug descriptors, push bytes to open
//! devices and inject enumeration or open failures.
//!
//! # Examples
//!
//! ```
//! use scanbridge_hardware::mock::MockHidTransport;
//! use scanbridge_hardware::traits::{HidTransport, ScannerDevice};
//! use scanbridge_hardware::DeviceDescriptor;
//!
//! #[tokio::main]
//! async fn main() -> scanbridge_hardware::Result<()> {
//!     let (transport, handle) = MockHidTransport::new();
//!     let descriptor = DeviceDescriptor::new(0x0c2e, 0x0b61, "mock://0");
//!     handle.plug(descriptor.clone());
//!
//!     let mut device = transport.open(&descriptor).await?;
//!     handle.send_bytes("mock://0", b"4006381333931\r");
//!
//!     let chunk = device.read_chunk().await?;
//!     assert_eq!(&chunk[..], b"4006381333931\r");
//!     Ok(())
//! }
//! ```

use crate::error::{HardwareError, Result};
use crate::traits::{HidTransport, ScannerDevice};
use crate::types::DeviceDescriptor;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

type ChunkSender = mpsc::UnboundedSender<Result<Bytes>>;

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<DeviceDescriptor>,
    connections: HashMap<String, ChunkSender>,
    fail_enumeration: bool,
    fail_open: bool,
    open_count: usize,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock HID subsystem.
#[derive(Debug, Clone)]
pub struct MockHidTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockHidTransport {
    /// Create an empty transport and the handle controlling it.
    pub fn new() -> (Self, MockHidHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockHidHandle { state },
        )
    }
}

impl HidTransport for MockHidTransport {
    type Device = MockScanner;

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        let state = lock(&self.state);
        if state.fail_enumeration {
            return Err(HardwareError::enumeration("mock enumeration failure"));
        }
        Ok(state.devices.clone())
    }

    async fn open(&self, descriptor: &DeviceDescriptor) -> Result<MockScanner> {
        let mut state = lock(&self.state);
        if state.fail_open {
            return Err(HardwareError::open_failed(
                &descriptor.path,
                "mock open failure",
            ));
        }
        if !state.devices.iter().any(|d| d.path == descriptor.path) {
            return Err(HardwareError::open_failed(&descriptor.path, "no such device"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.connections.insert(descriptor.path.clone(), tx);
        state.open_count += 1;

        Ok(MockScanner {
            path: descriptor.path.clone(),
            chunks: rx,
        })
    }
}

/// Open mock device.
#[derive(Debug)]
pub struct MockScanner {
    path: String,
    chunks: mpsc::UnboundedReceiver<Result<Bytes>>,
}

impl ScannerDevice for MockScanner {
    async fn read_chunk(&mut self) -> Result<Bytes> {
        match self.chunks.recv().await {
            Some(chunk) => chunk,
            None => Err(HardwareError::disconnected(&self.path)),
        }
    }

    fn path(&self) -> &str {
        &self.path
    }
}

/// Controls a [`MockHidTransport`].
#[derive(Debug, Clone)]
pub struct MockHidHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHidHandle {
    /// Attach a device; it appears in the next enumeration.
    pub fn plug(&self, descriptor: DeviceDescriptor) {
        lock(&self.state).devices.push(descriptor);
    }

    /// Detach a device and close its open handle, if any.
    pub fn unplug(&self, path: &str) {
        let mut state = lock(&self.state);
        state.devices.retain(|d| d.path != path);
        state.connections.remove(path);
    }

    /// Deliver bytes to the open handle for `path`.
    ///
    /// Returns `false` when no handle is open for that path.
    pub fn send_bytes(&self, path: &str, bytes: &[u8]) -> bool {
        lock(&self.state)
            .connections
            .get(path)
            .is_some_and(|tx| tx.send(Ok(Bytes::copy_from_slice(bytes))).is_ok())
    }

    /// Fail the open handle for `path` while leaving the device attached.
    pub fn fail_read(&self, path: &str) -> bool {
        let mut state = lock(&self.state);
        match state.connections.remove(path) {
            Some(tx) => tx
                .send(Err(HardwareError::read_failed(path, "mock read failure")))
                .is_ok(),
            None => false,
        }
    }

    pub fn set_enumeration_failure(&self, fail: bool) {
        lock(&self.state).fail_enumeration = fail;
    }

    pub fn set_open_failure(&self, fail: bool) {
        lock(&self.state).fail_open = fail;
    }

    /// Number of successful `open` calls so far.
    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }

    /// Returns `true` while a handle for `path` is open on the transport side.
    pub fn is_open(&self, path: &str) -> bool {
        lock(&self.state)
            .connections
            .get(path)
            .is_some_and(|tx| !tx.is_closed())
    }
}
