//! Reference tunables for the scan pipeline.
//!
//! Every timing and sizing value used by the framer, the device watcher and
//! the delivery sender lives here, so that embedders and the CLI share the
//! same defaults.
//!
//! # Usage
//!
//! Constants are organized by category:
//!
//! ```
//! use scanbridge_core::constants::*;
//! use std::time::Duration;
//!
//! // Framer
//! assert_eq!(LINE_TERMINATOR, b'\r');
//! let flush = Duration::from_millis(FLUSH_DELAY_MS);
//! assert_eq!(flush.as_millis(), 100);
//!
//! // Delivery
//! assert_eq!(MAX_DELIVERY_ATTEMPTS, 3);
//! ```

// ============================================================================
// Line Framing
// ============================================================================

/// Carriage return, the line terminator emitted by scanners in ASCII mode.
pub const LINE_TERMINATOR: u8 = b'\r';

/// Lowest printable ASCII byte kept by the framer.
pub const PRINTABLE_MIN: u8 = 0x20;

/// Highest printable ASCII byte kept by the framer.
pub const PRINTABLE_MAX: u8 = 0x7E;

/// Ceiling of the framer accumulation buffer (16 KiB).
///
/// When a terminator is never seen the oldest bytes are discarded so the
/// buffer never grows past this size.
pub const MAX_BUFFER_SIZE: usize = 16 * 1024;

/// Initial capacity of the framer buffer.
pub const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Delay after which an unterminated residual buffer is flushed as a line.
pub const FLUSH_DELAY_MS: u64 = 100;

// ============================================================================
// Device Discovery
// ============================================================================

/// Interval between two HID enumeration polls.
///
/// Trade-off between reconnection latency and USB bus overhead.
pub const POLL_INTERVAL_MS: u64 = 1000;

/// HID usage page assigned to bar code scanners (HID POS usage tables).
pub const BARCODE_SCANNER_USAGE_PAGE: u16 = 0x8C;

/// Timeout of a single blocking HID read on the native backend.
pub const HID_READ_TIMEOUT_MS: i32 = 50;

/// Largest HID input report read in one call.
pub const HID_REPORT_SIZE: usize = 64;

/// Number of presence transitions kept for diagnostics.
pub const MAX_PRESENCE_HISTORY: usize = 100;

// ============================================================================
// Delivery
// ============================================================================

/// Attempts per queue entry before the cycle counts as exhausted.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;

/// Consecutive failures that open the circuit.
pub const CIRCUIT_FAILURE_THRESHOLD: u32 = MAX_DELIVERY_ATTEMPTS;

/// Cool-down while the circuit is open.
pub const CIRCUIT_COOLDOWN_SECS: u64 = 60;

/// Sleep when the queue is empty.
pub const IDLE_INTERVAL_MS: u64 = 500;

/// Bounded timeout of one HTTP POST.
pub const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Base of the exponential backoff between attempts (`base * 2^attempt`).
pub const BACKOFF_BASE_MS: u64 = 1000;

/// Default location of the durable queue document.
pub const DEFAULT_QUEUE_PATH: &str = "scanbridge-queue.json";

// ============================================================================
// Code128
// ============================================================================

/// Start code value for subset A.
pub const CODE128_START_A: u8 = 103;

/// Start code value for subset B.
pub const CODE128_START_B: u8 = 104;

/// Start code value for subset C.
pub const CODE128_START_C: u8 = 105;

/// Stop code value.
pub const CODE128_STOP: u8 = 106;

/// Modulus of the Code128 check symbol.
pub const CODE128_MODULUS: u32 = 103;

/// First character of an AIM symbology identifier (`]C0`).
pub const AIM_PREFIX: char = ']';

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_window() {
        assert_eq!(PRINTABLE_MIN, b' ');
        assert_eq!(PRINTABLE_MAX, b'~');
        assert!(!(PRINTABLE_MIN..=PRINTABLE_MAX).contains(&LINE_TERMINATOR));
    }

    #[test]
    fn test_breaker_threshold_matches_retry_ceiling() {
        assert_eq!(CIRCUIT_FAILURE_THRESHOLD, MAX_DELIVERY_ATTEMPTS);
    }

    #[test]
    fn test_code128_framing_values() {
        assert!(CODE128_START_A < CODE128_START_B);
        assert!(CODE128_START_B < CODE128_START_C);
        assert_eq!(CODE128_STOP, CODE128_START_C + 1);
    }
}
