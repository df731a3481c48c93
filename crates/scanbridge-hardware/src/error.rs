//! Error types for HID transport and device presence operations.
//!
//! None of these errors are fatal to the device watcher: enumeration, open
//! and read failures are logged and retried on the next poll tick.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during HID operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// HID subsystem could not be initialized.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Listing HID devices failed (permissions, driver errors).
    #[error("Enumeration failed: {message}")]
    EnumerationFailed { message: String },

    /// Opening a device path failed.
    #[error("Failed to open {path}: {message}")]
    OpenFailed { path: String, message: String },

    /// Reading from an open device failed.
    #[error("Read error on {path}: {message}")]
    ReadFailed { path: String, message: String },

    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Presence transition rejected by the state machine.
    #[error("Invalid presence transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Device filter or watcher configuration error.
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Diagnostic snapshot could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    pub fn enumeration(message: impl Into<String>) -> Self {
        Self::EnumerationFailed {
            message: message.into(),
        }
    }

    pub fn open_failed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn read_failed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_failed_error() {
        let error = HardwareError::open_failed("/dev/hidraw3", "Permission denied");
        assert!(matches!(error, HardwareError::OpenFailed { .. }));
        assert_eq!(
            error.to_string(),
            "Failed to open /dev/hidraw3: Permission denied"
        );
    }

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("/dev/hidraw0");
        assert_eq!(error.to_string(), "Device disconnected: /dev/hidraw0");
    }

    #[test]
    fn test_enumeration_error() {
        let error = HardwareError::enumeration("hid_enumerate returned NULL");
        assert_eq!(
            error.to_string(),
            "Enumeration failed: hid_enumerate returned NULL"
        );
    }
}
