//! Device descriptors and the filter used to pick the scanner.

use crate::error::{HardwareError, Result};
use scanbridge_core::parse_u16_id;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One HID interface as reported by enumeration.
///
/// Produced by every poll; never persisted except in the diagnostic
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Platform path used to open the device.
    pub path: String,
    pub serial_number: Option<String>,
    pub product_name: Option<String>,
    pub usage_page: Option<u16>,
}

impl DeviceDescriptor {
    pub fn new(vendor_id: u16, product_id: u16, path: impl Into<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            path: path.into(),
            serial_number: None,
            product_name: None,
            usage_page: None,
        }
    }

    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    pub fn with_product_name(mut self, product_name: impl Into<String>) -> Self {
        self.product_name = Some(product_name.into());
        self
    }

    pub fn with_usage_page(mut self, usage_page: u16) -> Self {
        self.usage_page = Some(usage_page);
        self
    }

    /// Identity used to recognize the same physical unit across sessions.
    ///
    /// The serial number when the device reports a non-empty one, otherwise
    /// the path as a best-effort fallback.
    #[must_use]
    pub fn identity(&self) -> DeviceIdentity {
        match self.serial_number.as_deref().map(str::trim) {
            Some(serial) if !serial.is_empty() => DeviceIdentity::Serial(serial.to_string()),
            _ => DeviceIdentity::Path(self.path.clone()),
        }
    }

    /// Name for logs: product name when known, else the path.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.product_name.as_deref().unwrap_or(&self.path)
    }
}

/// Identity of a physical scanner for reconnection matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DeviceIdentity {
    Serial(String),
    Path(String),
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Serial(serial) => write!(f, "serial {serial}"),
            Self::Path(path) => write!(f, "path {path}"),
        }
    }
}

/// Selects the product among devices of the configured vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductSelector {
    /// Exact USB product id.
    Id(u16),
    /// Product name, compared case-insensitively after trimming.
    Name(String),
}

impl ProductSelector {
    /// Interpret configuration text: an id when it parses as decimal or `0x`
    /// hex, otherwise a product name.
    ///
    /// # Errors
    /// Returns `HardwareError::ConfigurationError` for blank input.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(HardwareError::configuration("product selector is empty"));
        }
        Ok(match parse_u16_id(trimmed) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(trimmed.to_string()),
        })
    }

    #[must_use]
    pub fn matches(&self, descriptor: &DeviceDescriptor) -> bool {
        match self {
            Self::Id(id) => descriptor.product_id == *id,
            Self::Name(name) => descriptor
                .product_name
                .as_deref()
                .is_some_and(|product| product.trim().eq_ignore_ascii_case(name)),
        }
    }
}

impl fmt::Display for ProductSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "0x{id:04x}"),
            Self::Name(name) => write!(f, "\"{name}\""),
        }
    }
}

/// Which enumerated devices count as "the scanner".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor_id: u16,
    pub product: ProductSelector,
    /// Restrict to one HID usage page (0x8C for bar code scanners).
    pub usage_page: Option<u16>,
}

impl DeviceFilter {
    pub fn new(vendor_id: u16, product: ProductSelector) -> Self {
        Self {
            vendor_id,
            product,
            usage_page: None,
        }
    }

    pub fn with_usage_page(mut self, usage_page: u16) -> Self {
        self.usage_page = Some(usage_page);
        self
    }

    #[must_use]
    pub fn matches(&self, descriptor: &DeviceDescriptor) -> bool {
        descriptor.vendor_id == self.vendor_id
            && self.product.matches(descriptor)
            && self
                .usage_page
                .is_none_or(|page| descriptor.usage_page == Some(page))
    }

    /// Keep matching devices in enumeration order.
    ///
    /// The first element is the one the watcher connects to.
    pub fn select(
        &self,
        devices: impl IntoIterator<Item = DeviceDescriptor>,
    ) -> Vec<DeviceDescriptor> {
        devices.into_iter().filter(|d| self.matches(d)).collect()
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "vendor 0x{:04x} product {}", self.vendor_id, self.product)?;
        if let Some(page) = self.usage_page {
            write!(f, " usage page 0x{page:02x}")?;
        }
        Ok(())
    }
}
