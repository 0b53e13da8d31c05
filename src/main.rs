//! CLI Entry Point for rust-daqd
//!
//! Serves the devices described in the configuration file (simulated by the
//! mock backend) and runs one command against them, writing the response
//! stream to stdout exactly as a connected client would receive it.
//!
//! # Usage
//!
//! ```bash
//! rust-daqd list
//! rust-daqd read iio:device0 1024 4 > samples.bin
//! rust-daqd --verbose attr-read ad7476 sampling_frequency
//! rust-daqd attr-write ad7476 sampling_frequency 500000
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use daq_driver_mock::MockContext;
use rust_daqd::config::{DaemonConfig, DEFAULT_CONFIG_PATH};
use rust_daqd::{logging, writer, Connection, SessionRegistry};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "rust-daqd")]
#[command(about = "Shared hardware acquisition streams for concurrent clients", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Report failures as `ERROR: <message>` lines
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List devices as `<id> <name>`
    List,

    /// Stream samples from a device
    Read {
        /// Device id or name
        device: String,
        /// Number of samples
        samples: usize,
        /// Bytes per sample
        sample_size: usize,
    },

    /// Read a device attribute
    AttrRead {
        /// Device id or name
        device: String,
        /// Attribute name
        attr: String,
    },

    /// Write a device attribute
    AttrWrite {
        /// Device id or name
        device: String,
        /// Attribute name
        attr: String,
        /// New value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = DaemonConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.validate()?;
    logging::init_from_config(&config).map_err(|e| anyhow!(e))?;
    info!(
        name = %config.application.name,
        devices = config.devices.len(),
        "Configuration loaded"
    );

    let ctx = Arc::new(MockContext::from_configs(&config.devices));
    let registry = SessionRegistry::new(config.session_settings());
    let conn = Connection::new(ctx, registry, writer::sink(std::io::stdout()))
        .with_verbose(cli.verbose || config.acquisition.verbose)
        .with_attribute_access(config.attribute_access());

    let result = match cli.command {
        Commands::List => {
            let mut out = conn.sink().lock();
            for device in conn.list_devices() {
                let line = format!("{} {}\n", device.id, device.name.unwrap_or_default());
                writer::write_all(&mut *out, line.as_bytes())?;
            }
            out.flush()?;
            return Ok(());
        }
        Commands::Read {
            device,
            samples,
            sample_size,
        } => conn.read_dev(&device, samples, sample_size),
        Commands::AttrRead { device, attr } => conn.read_dev_attr(&device, &attr),
        Commands::AttrWrite {
            device,
            attr,
            value,
        } => conn.write_dev_attr(&device, &attr, &value),
    };
    conn.sink().lock().flush()?;

    match result {
        Ok(bytes) => {
            info!(bytes, "Command completed");
            Ok(())
        }
        Err(err) => {
            error!(code = err.code(), error = %err, "Command failed");
            std::process::exit(1);
        }
    }
}
