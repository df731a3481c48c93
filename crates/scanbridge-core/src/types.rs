use crate::{Result, error::Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One physical scan: null-stripped and trimmed, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanLine(String);

impl ScanLine {
    /// Clean raw line text and wrap it.
    ///
    /// Embedded NUL characters are removed and surrounding whitespace is
    /// trimmed. Returns `None` when nothing is left.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let cleaned: String = raw.chars().filter(|c| *c != '\0').collect();
        let trimmed = cleaned.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(ScanLine(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ScanLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScanLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Barcode symbology a scan line was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbology {
    #[serde(rename = "EAN-13")]
    Ean13,
    #[serde(rename = "EAN-8")]
    Ean8,
    #[serde(rename = "UPC-A")]
    UpcA,
    #[serde(rename = "UPC-E")]
    UpcE,
    #[serde(rename = "Code128-A")]
    Code128A,
    #[serde(rename = "Code128-B")]
    Code128B,
    #[serde(rename = "Code128-C")]
    Code128C,
    /// Code128 announced by an AIM identifier other than `]A`/`]B`/`]C`.
    #[serde(rename = "Code128")]
    Code128Other,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Symbology {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Symbology::Ean13 => "EAN-13",
            Symbology::Ean8 => "EAN-8",
            Symbology::UpcA => "UPC-A",
            Symbology::UpcE => "UPC-E",
            Symbology::Code128A => "Code128-A",
            Symbology::Code128B => "Code128-B",
            Symbology::Code128C => "Code128-C",
            Symbology::Code128Other => "Code128",
            Symbology::Unknown => "UNKNOWN",
        }
    }

    /// Returns `true` for the EAN/UPC family validated with MOD-10.
    #[inline]
    #[must_use]
    pub fn is_ean_upc(self) -> bool {
        matches!(
            self,
            Symbology::Ean13 | Symbology::Ean8 | Symbology::UpcA | Symbology::UpcE
        )
    }

    /// Returns `true` for any Code128 subset.
    #[inline]
    #[must_use]
    pub fn is_code128(self) -> bool {
        matches!(
            self,
            Symbology::Code128A
                | Symbology::Code128B
                | Symbology::Code128C
                | Symbology::Code128Other
        )
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying and validating one scan line.
///
/// Invalid scans are data, not failures: they carry a description in
/// `error` and are delivered like valid ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub barcode: String,
    pub symbology: Symbology,
    pub valid: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    #[must_use]
    pub fn valid(barcode: impl Into<String>, symbology: Symbology) -> Self {
        Self {
            barcode: barcode.into(),
            symbology,
            valid: true,
            timestamp: Utc::now(),
            error: None,
        }
    }

    #[must_use]
    pub fn invalid(barcode: impl Into<String>, symbology: Symbology, error: &Error) -> Self {
        Self {
            barcode: barcode.into(),
            symbology,
            valid: false,
            timestamp: Utc::now(),
            error: Some(error.to_string()),
        }
    }

    /// Build from a validation outcome.
    #[must_use]
    pub fn from_outcome(
        barcode: impl Into<String>,
        symbology: Symbology,
        outcome: Result<()>,
    ) -> Self {
        match outcome {
            Ok(()) => Self::valid(barcode, symbology),
            Err(e) => Self::invalid(barcode, symbology, &e),
        }
    }

    /// Override the timestamp (useful for replay and tests).
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Wire body POSTed to the collector.
///
/// `simbology` keeps the field name deployed collectors already parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPayload {
    pub simbology: String,
    pub valid: bool,
    pub barcode: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ValidationResult> for DeliveryPayload {
    fn from(result: &ValidationResult) -> Self {
        Self {
            simbology: result.symbology.to_string(),
            valid: result.valid,
            barcode: result.barcode.clone(),
            timestamp: result.timestamp,
            error: result.error.clone(),
        }
    }
}

/// Parse a USB vendor or product id written in decimal or `0x` hex.
///
/// # Errors
/// Returns `Error::InvalidDeviceId` when the text is empty, malformed, or
/// does not fit in 16 bits.
pub fn parse_u16_id(value: &str) -> Result<u16> {
    let trimmed = value.trim();
    let invalid = |reason: &str| Error::InvalidDeviceId {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }

    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => trimmed.parse::<u32>(),
    }
    .map_err(|e| invalid(&e.to_string()))?;

    u16::try_from(parsed).map_err(|_| invalid("out of range for a 16-bit id"))
}
