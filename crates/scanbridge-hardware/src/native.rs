//! Native HID backend built on `hidapi`.
//!
//! `hidapi` calls block, so enumeration runs on the blocking pool and every
//! open device gets a dedicated reader thread. The thread owns the
//! `HidDevice`, polls it with a short read timeout and forwards each report
//! over a channel; dropping the [`HidScanner`] stops the thread and closes
//! the device.

use crate::error::{HardwareError, Result};
use crate::traits::{HidTransport, ScannerDevice};
use crate::types::DeviceDescriptor;
use bytes::Bytes;
use hidapi::HidApi;
use scanbridge_core::constants::{HID_READ_TIMEOUT_MS, HID_REPORT_SIZE};
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Reports buffered between the reader thread and the pipeline.
const CHUNK_CHANNEL_CAPACITY: usize = 64;

fn lock(api: &Mutex<HidApi>) -> MutexGuard<'_, HidApi> {
    api.lock().unwrap_or_else(PoisonError::into_inner)
}

/// HID subsystem accessed through `hidapi`.
#[derive(Clone)]
pub struct HidApiTransport {
    api: Arc<Mutex<HidApi>>,
}

impl std::fmt::Debug for HidApiTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidApiTransport").finish_non_exhaustive()
    }
}

impl HidApiTransport {
    /// Initialize the HID library.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InitializationFailed` if the platform HID
    /// layer cannot be initialized.
    pub fn new() -> Result<Self> {
        let api = HidApi::new().map_err(|e| HardwareError::initialization_failed(e.to_string()))?;
        Ok(Self {
            api: Arc::new(Mutex::new(api)),
        })
    }
}

impl HidTransport for HidApiTransport {
    type Device = HidScanner;

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        let api = Arc::clone(&self.api);

        tokio::task::spawn_blocking(move || {
            let mut api = lock(&api);
            api.refresh_devices()
                .map_err(|e| HardwareError::enumeration(e.to_string()))?;

            Ok(api
                .device_list()
                .map(|info| DeviceDescriptor {
                    vendor_id: info.vendor_id(),
                    product_id: info.product_id(),
                    path: info.path().to_string_lossy().into_owned(),
                    serial_number: info.serial_number().map(str::to_string),
                    product_name: info.product_string().map(str::to_string),
                    usage_page: Some(info.usage_page()),
                })
                .collect())
        })
        .await
        .map_err(|e| HardwareError::enumeration(format!("enumeration task failed: {e}")))?
    }

    async fn open(&self, descriptor: &DeviceDescriptor) -> Result<HidScanner> {
        let path = descriptor.path.clone();
        let c_path = CString::new(path.clone())
            .map_err(|_| HardwareError::open_failed(&path, "path contains a NUL byte"))?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));

        let reader = ReaderThread {
            api: Arc::clone(&self.api),
            path: path.clone(),
            c_path,
            chunks: chunk_tx,
            stop: Arc::clone(&stop),
        };
        std::thread::Builder::new()
            .name("hid-reader".to_string())
            .spawn(move || reader.run(ready_tx))?;

        ready_rx
            .await
            .map_err(|_| HardwareError::open_failed(&path, "reader thread exited"))??;

        Ok(HidScanner {
            path,
            chunks: chunk_rx,
            stop,
        })
    }
}

struct ReaderThread {
    api: Arc<Mutex<HidApi>>,
    path: String,
    c_path: CString,
    chunks: mpsc::Sender<Result<Bytes>>,
    stop: Arc<AtomicBool>,
}

impl ReaderThread {
    fn run(self, ready: oneshot::Sender<Result<()>>) {
        let opened = lock(&self.api).open_path(&self.c_path);
        let device = match opened {
            Ok(device) => {
                let _ = ready.send(Ok(()));
                device
            }
            Err(e) => {
                let _ = ready.send(Err(HardwareError::open_failed(&self.path, e.to_string())));
                return;
            }
        };

        let mut report = [0u8; HID_REPORT_SIZE];
        while !self.stop.load(Ordering::Relaxed) {
            match device.read_timeout(&mut report, HID_READ_TIMEOUT_MS) {
                Ok(0) => {}
                Ok(n) => {
                    if self
                        .chunks
                        .blocking_send(Ok(Bytes::copy_from_slice(&report[..n])))
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    warn!(path = %self.path, error = %e, "HID read failed");
                    let _ = self
                        .chunks
                        .blocking_send(Err(HardwareError::read_failed(&self.path, e.to_string())));
                    break;
                }
            }
        }
        debug!(path = %self.path, "HID reader stopped");
    }
}

/// Open scanner on the native backend.
#[derive(Debug)]
pub struct HidScanner {
    path: String,
    chunks: mpsc::Receiver<Result<Bytes>>,
    stop: Arc<AtomicBool>,
}

impl ScannerDevice for HidScanner {
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

impl Drop for HidScanner {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
