//! Delivery side of scanbridge.
//!
//! This crate drains the durable queue to the configured HTTP collector.
//!
//! # Components
//!
//! - **HttpDelivery**: one JSON POST per call, 2xx is success
//! - **CircuitBreaker**: opens after consecutive failed attempts, closes after a cool-down
//! - **DeliverySender**: the single drain loop with retry and backoff
//!
//! # Example
//!
//! ```no_run
//! use scanbridge_network::{DeliverySender, SenderConfig};
//! use scanbridge_storage::{QueueConfig, QueueStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = QueueStore::open(QueueConfig::new("queue.json")).await?;
//! let sender = DeliverySender::new(queue, SenderConfig::default())?.start();
//!
//! // ... later
//! println!("{:?}", sender.stats());
//! sender.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod breaker;
pub mod client;
pub mod error;
pub mod sender;

pub use breaker::{CircuitBreaker, CircuitState};
pub use client::{HttpDelivery, parse_endpoint};
pub use error::DeliveryError;
pub use reqwest::Url;
pub use sender::{DeliverySender, SenderConfig, SenderHandle, SenderStats};
