//! Command-line runner: acquire from the configured transports and print every sample.
//!
//! ```bash
//! light-daq --config config/light_daq.toml
//! light-daq --priority udp --udp-port 9000 --log-level debug
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use light_daq::config::{PriorityPolicy, Settings, TransportKind, DEFAULT_CONFIG_PATH};
use light_daq::{logging, CommunicationManager};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Consumer poll period, roughly one display frame.
const POLL_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Configuration file (TOML); missing files fall back to defaults
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Serial device name (e.g. /dev/ttyUSB0, COM3)
    #[arg(long)]
    serial_port: Option<String>,

    #[arg(long)]
    baud_rate: Option<u32>,

    /// Local UDP port to listen on
    #[arg(long)]
    udp_port: Option<u16>,

    /// Transport priority, most preferred first (e.g. serial,udp)
    #[arg(long, value_delimiter = ',')]
    priority: Option<Vec<TransportKind>>,

    /// concurrent or failover
    #[arg(long)]
    policy: Option<PriorityPolicy>,

    /// Only validate configuration and print it
    #[arg(long)]
    validate: bool,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(level) = &self.log_level {
            settings.application.log_level = level.clone();
        }
        if let Some(port) = &self.serial_port {
            settings.transport.port_name = port.clone();
        }
        if let Some(baud) = self.baud_rate {
            settings.transport.baud_rate = baud;
        }
        if let Some(port) = self.udp_port {
            settings.transport.udp_port = port;
        }
        if let Some(priority) = &self.priority {
            settings.transport.priority = priority.clone();
        }
        if let Some(policy) = self.policy {
            settings.transport.policy = policy;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load_from(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    args.apply(&mut settings);
    settings.validate().context("Invalid configuration")?;

    if args.validate {
        println!("{:#?}", settings);
        return Ok(());
    }

    logging::init_from_config(&settings)?;

    let mut manager = CommunicationManager::new(settings);
    manager.start().context("Failed to start acquisition")?;

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for sample in manager.drain() {
                    println!("{}", sample);
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}
