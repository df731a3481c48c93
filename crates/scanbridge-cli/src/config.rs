//! Command line and environment configuration.
//!
//! Every flag has a `SCANBRIDGE_*` environment twin and is read once at
//! startup. [`Cli::settings`] turns the parsed values into the library
//! configuration structs.

use clap::{Parser, ValueEnum};
use scanbridge_core::constants::{
    CIRCUIT_COOLDOWN_SECS, DEFAULT_QUEUE_PATH, FLUSH_DELAY_MS, MAX_DELIVERY_ATTEMPTS,
    POLL_INTERVAL_MS, REQUEST_TIMEOUT_SECS,
};
use scanbridge_core::parse_u16_id;
use scanbridge_hardware::{DeviceFilter, ProductSelector, WatcherConfig};
use scanbridge_network::{SenderConfig, Url, parse_endpoint};
use scanbridge_protocol::FramerConfig;
use scanbridge_storage::QueueConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// One JSON object per line
    Json,
}

/// HID backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// hidapi (requires the `hardware-usb` build feature)
    Hid,
    /// No physical devices; only drains the existing queue
    Mock,
}

/// Bridge a USB HID barcode scanner to an HTTP collector.
#[derive(Parser, Debug)]
#[command(name = "scanbridge", version, about)]
pub struct Cli {
    /// USB vendor id (decimal or 0x-prefixed hex)
    #[arg(long, env = "SCANBRIDGE_VENDOR_ID", value_parser = parse_id)]
    pub vendor_id: u16,

    /// Product id (decimal or 0x hex) or product name
    #[arg(long, env = "SCANBRIDGE_PRODUCT", value_parser = parse_product)]
    pub product: ProductSelector,

    /// Delivery endpoint (http or https URL)
    #[arg(long, env = "SCANBRIDGE_ENDPOINT", value_parser = parse_url)]
    pub endpoint: Url,

    /// Durable queue document
    #[arg(long, env = "SCANBRIDGE_QUEUE_PATH", default_value = DEFAULT_QUEUE_PATH)]
    pub queue_path: PathBuf,

    /// Write matched devices as JSON here on every connection
    #[arg(long, env = "SCANBRIDGE_DEVICES_PATH")]
    pub devices_path: Option<PathBuf>,

    /// Only match devices on this HID usage page (0x8C = bar code scanner)
    #[arg(long, env = "SCANBRIDGE_USAGE_PAGE", value_parser = parse_id)]
    pub usage_page: Option<u16>,

    /// Device poll interval in milliseconds
    #[arg(long, env = "SCANBRIDGE_POLL_INTERVAL_MS", default_value_t = POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Idle time before an unterminated scan is flushed, in milliseconds
    #[arg(long, env = "SCANBRIDGE_FLUSH_DELAY_MS", default_value_t = FLUSH_DELAY_MS)]
    pub flush_delay_ms: u64,

    /// Delivery attempts per entry before backing off
    #[arg(long, env = "SCANBRIDGE_MAX_ATTEMPTS", default_value_t = MAX_DELIVERY_ATTEMPTS,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: u32,

    /// Seconds the delivery circuit stays open
    #[arg(long, env = "SCANBRIDGE_COOLDOWN_SECS", default_value_t = CIRCUIT_COOLDOWN_SECS)]
    pub cooldown_secs: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "SCANBRIDGE_REQUEST_TIMEOUT_SECS", default_value_t = REQUEST_TIMEOUT_SECS,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout_secs: u64,

    /// Log output format
    #[arg(long, env = "SCANBRIDGE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// HID backend
    #[arg(long, env = "SCANBRIDGE_BACKEND", value_enum, default_value_t = Backend::Hid)]
    pub backend: Backend,
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: Backend,
    pub endpoint: Url,
    pub watcher: WatcherConfig,
    pub sender: SenderConfig,
    pub queue: QueueConfig,
}

impl Cli {
    pub fn settings(&self) -> Settings {
        let mut filter = DeviceFilter::new(self.vendor_id, self.product.clone());
        if let Some(page) = self.usage_page {
            filter = filter.with_usage_page(page);
        }

        let framer =
            FramerConfig::default().with_flush_delay(Duration::from_millis(self.flush_delay_ms));
        let mut watcher = WatcherConfig::new(filter)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms.max(1)))
            .with_framer(framer);
        if let Some(path) = &self.devices_path {
            watcher = watcher.with_devices_path(path);
        }

        let sender = SenderConfig::default()
            .with_max_attempts(self.max_attempts)
            .with_failure_threshold(self.max_attempts)
            .with_cooldown(Duration::from_secs(self.cooldown_secs))
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs));

        Settings {
            backend: self.backend,
            endpoint: self.endpoint.clone(),
            watcher,
            sender,
            queue: QueueConfig::new(&self.queue_path),
        }
    }
}

fn parse_id(value: &str) -> Result<u16, String> {
    parse_u16_id(value).map_err(|e| e.to_string())
}

fn parse_product(value: &str) -> Result<ProductSelector, String> {
    ProductSelector::parse(value).map_err(|e| e.to_string())
}

fn parse_url(value: &str) -> Result<Url, String> {
    parse_endpoint(value).map_err(|e| e.to_string())
}
