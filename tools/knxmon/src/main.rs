//! knxmon - KNX TP-UART device runner and bus monitor
//!
//! Device mode runs the configured communication objects on the bus and
//! logs every value received. Monitor mode switches the transceiver to bus
//! monitor and logs each telegram as raw bytes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use voltage_knx::telegram::TELEGRAM_MAX_SIZE;
use voltage_knx::{
    DeviceConfig, KnxDevice, MonitorData, SystemClock, TpUart, TpUartMode, UartLink,
};

/// Idle sleep between polls; well below the 400 µs RX deadline
const POLL_SLEEP: Duration = Duration::from_micros(100);

#[derive(Parser, Debug)]
#[command(name = "knxmon")]
#[command(about = "KNX TP-UART device runner and bus monitor")]
struct Args {
    /// Device configuration (YAML, TOML or JSON)
    #[arg(short, long, default_value = "config/knx.yaml")]
    config: PathBuf,

    /// Serial port, overrides the configuration
    #[arg(short, long, env = "KNX_PORT")]
    port: Option<String>,

    /// Log filter when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log raw bus traffic instead of running the device
    #[arg(short, long)]
    monitor: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut config = DeviceConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(port) = args.port {
        config.serial.port = port;
    }
    if args.monitor {
        config.mode = TpUartMode::BusMonitor;
    }

    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = Arc::clone(&stop);
    let mut worker = tokio::task::spawn_blocking(move || match config.mode {
        TpUartMode::Normal => run_device(&config, &worker_stop),
        TpUartMode::BusMonitor => run_monitor(&config, &worker_stop),
    });

    tokio::select! {
        result = &mut worker => return result.context("Poll loop panicked")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            stop.store(true, Ordering::Relaxed);
        }
    }

    worker.await.context("Poll loop panicked")?
}

fn open_link(config: &DeviceConfig) -> Result<UartLink> {
    UartLink::open(&config.serial.port, config.serial.baud_rate)
        .with_context(|| format!("Cannot open {}", config.serial.port))
}

fn run_device(config: &DeviceConfig, stop: &AtomicBool) -> Result<()> {
    let link = open_link(config)?;
    let mut device = KnxDevice::from_config(link, SystemClock::new(), config)?;
    device.begin()?;

    while !stop.load(Ordering::Relaxed) {
        if let Err(e) = device.task() {
            if e.is_fatal() {
                return Err(e.into());
            }
            warn!("Device task: {}", e);
        }

        let updated: Vec<usize> = device.drain_updates().collect();
        for index in updated {
            let Some(object) = device.object(index) else {
                continue;
            };
            match device.read_numeric(index) {
                Ok(value) => info!(
                    "{} [{}] = {}",
                    object.address(),
                    object.dpt(),
                    value.as_f64()
                ),
                Err(_) => info!(
                    "{} [{}] = {:02X?}",
                    object.address(),
                    object.dpt(),
                    object.value_bytes()
                ),
            }
        }

        if !device.is_active() {
            std::thread::sleep(POLL_SLEEP);
        }
    }

    let stats = device.queue_stats();
    info!(
        "Stopping device: {} actions pending, high water {}, {} lost",
        stats.len, stats.high_water, stats.lost
    );
    device.end();
    Ok(())
}

fn run_monitor(config: &DeviceConfig, stop: &AtomicBool) -> Result<()> {
    let link = open_link(config)?;
    let mut tpuart = TpUart::new(
        link,
        SystemClock::new(),
        config.physical_address,
        TpUartMode::BusMonitor,
    )
    .with_timing(config.timing.tpuart());

    tpuart.reset()?;
    while !tpuart.poll_reset()? {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }
        std::thread::sleep(POLL_SLEEP);
    }
    tpuart.init()?;
    info!("Monitoring {}", config.serial.port);

    let mut frame: Vec<u8> = Vec::with_capacity(32);
    let mut frames: u64 = 0;
    while !stop.load(Ordering::Relaxed) {
        match tpuart.monitor_data()? {
            Some(MonitorData::Byte(byte)) => frame.push(byte),
            Some(MonitorData::EndOfPacket) => {
                frames += 1;
                if frame.len() > TELEGRAM_MAX_SIZE {
                    warn!("Oversize frame ({} bytes): {:02X?}", frame.len(), frame);
                } else {
                    info!("{:02X?}", frame);
                }
                frame.clear();
            }
            None => std::thread::sleep(POLL_SLEEP),
        }
    }
    debug!("{} frames seen", frames);
    Ok(())
}
