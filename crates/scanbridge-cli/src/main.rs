//! `scanbridge`: USB HID barcode scanner to HTTP collector bridge.
//!
//! Wires the device watcher, the validator, the durable queue and the
//! delivery sender together, then runs until interrupted.

mod bridge;
mod config;

use anyhow::Context;
use clap::Parser;
use scanbridge_hardware::DeviceWatcher;
use scanbridge_hardware::devices::AnyHidTransport;
use scanbridge_hardware::mock::MockHidTransport;
use scanbridge_network::DeliverySender;
use scanbridge_storage::QueueStore;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::bridge::ScanBridge;
use crate::config::{Backend, Cli, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.settings();
    info!(
        version = scanbridge_core::VERSION,
        filter = %settings.watcher.filter,
        endpoint = %settings.endpoint,
        queue = %settings.queue.path.display(),
        "starting scanbridge"
    );

    let transport = build_transport(settings.backend)?;
    let queue = QueueStore::open(settings.queue.clone())
        .await
        .with_context(|| format!("failed to open queue {}", settings.queue.path.display()))?;

    let sender = DeliverySender::new(queue.clone(), settings.sender.clone())
        .context("failed to create delivery client")?
        .start();
    let mut watcher = DeviceWatcher::new(transport, settings.watcher.clone()).start();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown requested");
            cancel.cancel();
        }
    });

    ScanBridge::new(queue, settings.endpoint)
        .run(&mut watcher, &cancel)
        .await;

    watcher.shutdown().await.context("device watcher shutdown failed")?;
    let stats = sender.stats();
    sender.shutdown().await;

    info!(
        delivered = stats.delivered,
        failed_attempts = stats.failed_attempts,
        circuit = %stats.circuit,
        "scanbridge stopped"
    );
    Ok(())
}

fn build_transport(backend: Backend) -> anyhow::Result<AnyHidTransport> {
    match backend {
        Backend::Hid => native_transport(),
        Backend::Mock => {
            warn!("mock backend selected, no scanner will be attached");
            let (transport, _handle) = MockHidTransport::new();
            Ok(AnyHidTransport::Mock(transport))
        }
    }
}

#[cfg(feature = "hardware-usb")]
fn native_transport() -> anyhow::Result<AnyHidTransport> {
    let transport = scanbridge_hardware::native::HidApiTransport::new()
        .context("failed to initialize hidapi")?;
    Ok(AnyHidTransport::Native(transport))
}

#[cfg(not(feature = "hardware-usb"))]
fn native_transport() -> anyhow::Result<AnyHidTransport> {
    anyhow::bail!(
        "built without HID support; rebuild with `--features hardware-usb` or pass `--backend mock`"
    )
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!(error = %e, "cannot listen for SIGTERM"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for interrupt signal");
        std::future::pending::<()>().await;
    }
}
