//! Enum wrappers for HID backend dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) is not object-safe, so
//! `Box<dyn HidTransport>` is not an option. The enums below give concrete
//! type dispatch instead, which also keeps the futures `Send` when the
//! watcher spawns them on Tokio.
//!
//! # Examples
//!
//! ```
//! use scanbridge_hardware::devices::AnyHidTransport;
//! use scanbridge_hardware::mock::MockHidTransport;
//!
//! let (transport, _handle) = MockHidTransport::new();
//! let transport = AnyHidTransport::Mock(transport);
//! ```

use crate::mock::{MockHidTransport, MockScanner};
#[cfg(feature = "hardware-usb")]
use crate::native::{HidApiTransport, HidScanner};
use crate::traits::{HidTransport, ScannerDevice};
use crate::{DeviceDescriptor, Result};
use bytes::Bytes;

/// Any HID transport backend.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyHidTransport {
    /// In-memory transport for development and testing.
    Mock(MockHidTransport),

    /// `hidapi` transport.
    #[cfg(feature = "hardware-usb")]
    Native(HidApiTransport),
}

impl HidTransport for AnyHidTransport {
    type Device = AnyScannerDevice;

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        match self {
            Self::Mock(transport) => transport.enumerate().await,
            #[cfg(feature = "hardware-usb")]
            Self::Native(transport) => transport.enumerate().await,
        }
    }

    async fn open(&self, descriptor: &DeviceDescriptor) -> Result<AnyScannerDevice> {
        match self {
            Self::Mock(transport) => transport.open(descriptor).await.map(AnyScannerDevice::Mock),
            #[cfg(feature = "hardware-usb")]
            Self::Native(transport) => transport
                .open(descriptor)
                .await
                .map(AnyScannerDevice::Native),
        }
    }
}

/// Any open scanner handle.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyScannerDevice {
    Mock(MockScanner),

    #[cfg(feature = "hardware-usb")]
    Native(HidScanner),
}

impl ScannerDevice for AnyScannerDevice {
    async fn read_chunk(&mut self) -> Result<Bytes> {
        match self {
            Self::Mock(device) => device.read_chunk().await,
            #[cfg(feature = "hardware-usb")]
            Self::Native(device) => device.read_chunk().await,
        }
    }

    fn path(&self) -> &str {
        match self {
            Self::Mock(device) => device.path(),
            #[cfg(feature = "hardware-usb")]
            Self::Native(device) => device.path(),
        }
    }
}
