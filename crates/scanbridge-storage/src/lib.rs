//! Durable delivery queue for scanbridge.
//!
//! Validated scan events wait here until the sender confirms delivery. The
//! queue is a single JSON document holding an ordered list of
//! [`QueueEntry`] values; it is the only source of truth for undelivered
//! events and survives process restarts.
//!
//! # Examples
//!
//! ```no_run
//! use scanbridge_storage::{QueueConfig, QueueStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = QueueStore::open(QueueConfig::new("/var/lib/scanbridge/queue.json")).await?;
//!
//! let body = serde_json::json!({"simbology": "EAN-13", "valid": true});
//! queue.enqueue("https://collector.example/scans", &body).await?;
//!
//! if let Some(entry) = queue.peek_front().await? {
//!     // deliver entry.payload to entry.url, then acknowledge it
//!     queue.remove(entry.id).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod queue;

pub use config::QueueConfig;
pub use entry::QueueEntry;
pub use error::{StorageError, StorageResult};
pub use queue::QueueStore;
