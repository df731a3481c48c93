use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Barcode errors
    #[error("Invalid barcode format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Unsupported or unrecognized format: {0}")]
    UnsupportedSymbology(String),

    // Device identification errors
    #[error("Invalid device id '{value}': {reason}")]
    InvalidDeviceId { value: String, reason: String },
}

impl Error {
    /// Build a checksum mismatch from the expected and declared check values.
    pub fn checksum(expected: impl ToString, actual: impl ToString) -> Self {
        Self::ChecksumMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
