//! Line framer for HID bar code scanner byte streams.
//!
//! Scanners in ASCII mode deliver the payload as printable ASCII terminated by
//! a carriage return. The byte stream arrives in arbitrary fragments, may carry
//! control or noise bytes, and the last line of a session sometimes has no
//! terminator at all.
//!
//! [`LineFramer`] accumulates filtered bytes and extracts completed lines at
//! every carriage return. A residual unterminated buffer is released by
//! [`LineFramer::flush`], which the caller invokes once no new data has
//! arrived for [`FramerConfig::flush_delay`].
//!
//! # Usage
//!
//! ```
//! use scanbridge_protocol::LineFramer;
//!
//! let mut framer = LineFramer::new();
//!
//! framer.feed(b"40063");
//! framer.feed(b"81333931\r0123");
//! assert_eq!(framer.next_line().unwrap().as_str(), "4006381333931");
//!
//! // No terminator for the last scan: flushed by the caller's timer
//! assert!(framer.has_pending());
//! assert_eq!(framer.flush().unwrap().as_str(), "0123");
//! ```

use bytes::BytesMut;
use scanbridge_core::ScanLine;
use scanbridge_core::constants::{
    FLUSH_DELAY_MS, INITIAL_BUFFER_CAPACITY, LINE_TERMINATOR, MAX_BUFFER_SIZE, PRINTABLE_MAX,
    PRINTABLE_MIN,
};
use std::collections::VecDeque;
use std::time::Duration;

/// Initial capacity of the completed-line queue.
const INITIAL_LINE_QUEUE_CAPACITY: usize = 4;

/// Framer tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerConfig {
    /// Ceiling of the accumulation buffer; oldest bytes are dropped past it.
    pub max_buffer_size: usize,
    /// Quiet period after which residual bytes are treated as a line.
    pub flush_delay: Duration,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: MAX_BUFFER_SIZE,
            flush_delay: Duration::from_millis(FLUSH_DELAY_MS),
        }
    }
}

impl FramerConfig {
    #[must_use]
    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }
}

/// Returns `true` for bytes the framer keeps: CR and printable ASCII.
#[inline]
#[must_use]
pub fn is_payload_byte(byte: u8) -> bool {
    byte == LINE_TERMINATOR || (PRINTABLE_MIN..=PRINTABLE_MAX).contains(&byte)
}

/// Stateful framer turning raw chunks into [`ScanLine`]s.
///
/// Every accepted byte is consumed at most once: extraction splits the
/// consumed prefix (including its terminator) off the buffer, and
/// [`flush`](Self::flush) empties it.
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    lines: VecDeque<ScanLine>,
    config: FramerConfig,
    dropped_bytes: u64,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_config(FramerConfig::default())
    }

    pub fn with_config(config: FramerConfig) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY.min(config.max_buffer_size)),
            lines: VecDeque::with_capacity(INITIAL_LINE_QUEUE_CAPACITY),
            config,
            dropped_bytes: 0,
        }
    }

    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    /// Feed one raw chunk.
    ///
    /// Returns the number of lines completed by this chunk. Completed lines
    /// are queued until taken with [`next_line`](Self::next_line) or
    /// [`drain_lines`](Self::drain_lines).
    pub fn feed(&mut self, chunk: &[u8]) -> usize {
        let before = self.lines.len();

        self.buffer
            .extend(chunk.iter().copied().filter(|b| is_payload_byte(*b)));

        while self.try_extract_line() {}

        self.enforce_ceiling();
        self.lines.len() - before
    }

    /// Take the oldest completed line.
    pub fn next_line(&mut self) -> Option<ScanLine> {
        self.lines.pop_front()
    }

    /// Number of completed lines waiting to be taken.
    pub fn lines_available(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if unterminated bytes are buffered.
    ///
    /// The caller arms its flush timer while this holds.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Number of unterminated bytes buffered.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes discarded by the buffer ceiling since creation.
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    /// Treat the residual buffer as a complete line.
    ///
    /// The buffer is emptied whether or not the cleaned residue is empty.
    pub fn flush(&mut self) -> Option<ScanLine> {
        if self.buffer.is_empty() {
            return None;
        }
        let residue = self.buffer.split();
        Self::clean(&residue)
    }

    /// Drop buffered bytes and queued lines.
    ///
    /// Used when the device goes away so a partial scan never leaks into the
    /// next session.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.lines.clear();
    }

    /// Iterator over the currently queued lines.
    pub fn drain_lines(&mut self) -> DrainLines<'_> {
        DrainLines { framer: self }
    }

    fn try_extract_line(&mut self) -> bool {
        let Some(pos) = self.buffer.iter().position(|&b| b == LINE_TERMINATOR) else {
            return false;
        };

        let raw = self.buffer.split_to(pos);
        let _ = self.buffer.split_to(1); // Consume CR

        if let Some(line) = Self::clean(&raw) {
            self.lines.push_back(line);
        }
        true
    }

    fn enforce_ceiling(&mut self) {
        let len = self.buffer.len();
        if len > self.config.max_buffer_size {
            let excess = len - self.config.max_buffer_size;
            let _ = self.buffer.split_to(excess);
            self.dropped_bytes += excess as u64;
        }
    }

    fn clean(raw: &[u8]) -> Option<ScanLine> {
        ScanLine::new(&String::from_utf8_lossy(raw))
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator created by [`LineFramer::drain_lines`].
pub struct DrainLines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for DrainLines<'_> {
    type Item = ScanLine;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_line()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.framer.lines_available();
        (len, Some(len))
    }
}

impl ExactSizeIterator for DrainLines<'_> {}
