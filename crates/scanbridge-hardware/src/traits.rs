//! HID transport trait definitions.
//!
//! The watcher talks to the HID subsystem only through these traits, so the
//! native `hidapi` backend and the in-memory mock are interchangeable.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro. Because such traits are
//! not object-safe, callers dispatch through the enums in
//! [`devices`](crate::devices).

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::DeviceDescriptor;
use bytes::Bytes;

/// Access to the system's HID device list.
pub trait HidTransport: Send + Sync {
    /// Handle type returned by [`open`](Self::open).
    type Device: ScannerDevice;

    /// List every HID interface currently attached, in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the HID subsystem cannot be queried. Callers
    /// treat this as "no device found" for the current poll.
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>>;

    /// Open the device at `descriptor.path` for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the device vanished or access was denied.
    async fn open(&self, descriptor: &DeviceDescriptor) -> Result<Self::Device>;
}

/// An open scanner handle producing raw byte chunks.
///
/// Dropping the handle closes the device.
pub trait ScannerDevice: Send {
    /// Wait for the next chunk of raw bytes.
    ///
    /// Implementations must be cancel-safe: dropping the returned future
    /// before completion must not lose data.
    ///
    /// # Errors
    ///
    /// Returns an error once the device is gone or a read fails. The handle
    /// is unusable afterwards.
    async fn read_chunk(&mut self) -> Result<Bytes>;

    /// Path the handle was opened from.
    fn path(&self) -> &str;
}
