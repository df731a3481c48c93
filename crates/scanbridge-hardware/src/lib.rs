//! HID device layer for the scanbridge pipeline.
//!
//! This crate discovers the configured bar code scanner, keeps a single
//! logical connection to it across hot-plugging and turns its raw byte
//! stream into [`ScanLine`](scanbridge_core::ScanLine)s.
//!
//! # Design Philosophy
//!
//! - **Async-first**: transport traits use native `async fn` (Rust 1.90 +
//!   Edition 2024 RPITIT).
//! - **Enum dispatch**: [`devices::AnyHidTransport`] selects the native or
//!   the mock backend without trait objects.
//! - **Single owner**: the watcher task exclusively owns the presence state
//!   and the open device handle.
//! - **Never fatal**: enumeration, open and read failures are logged and
//!   retried on the next poll tick.
//!
//! # Backends
//!
//! The `hidapi` backend is compiled with the `hardware-usb` feature. The
//! [`mock`] backend is always available for development and testing.
//!
//! # Example
//!
//! ```no_run
//! use scanbridge_hardware::devices::AnyHidTransport;
//! use scanbridge_hardware::mock::MockHidTransport;
//! use scanbridge_hardware::{
//!     DeviceFilter, DeviceWatcher, ProductSelector, ScannerEvent, WatcherConfig,
//! };
//!
//! # async fn example() -> scanbridge_hardware::Result<()> {
//! let (transport, _handle) = MockHidTransport::new();
//! let filter = DeviceFilter::new(0x0c2e, ProductSelector::parse("Honeywell 1900")?);
//! let config = WatcherConfig::new(filter);
//! let mut watcher = DeviceWatcher::new(AnyHidTransport::Mock(transport), config).start();
//!
//! while let Some(event) = watcher.recv().await {
//!     match event {
//!         ScannerEvent::Connected(d) | ScannerEvent::Reconnected(d) => println!("up: {}", d.path),
//!         ScannerEvent::Disconnected(d) => println!("down: {}", d.path),
//!         ScannerEvent::Line(line) => println!("scan: {line}"),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod devices;
pub mod error;
pub mod mock;
#[cfg(feature = "hardware-usb")]
pub mod native;
pub mod pipeline;
pub mod presence;
pub mod traits;
pub mod types;
pub mod watcher;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use pipeline::PipelineExit;
pub use presence::{ConnectionState, PresenceMachine, PresenceTransition};
pub use traits::{HidTransport, ScannerDevice};
pub use types::{DeviceDescriptor, DeviceFilter, DeviceIdentity, ProductSelector};
pub use watcher::{DeviceWatcher, ScannerEvent, WatcherConfig, WatcherHandle};
