//! anchor-io - FMCOMMS5 anchor daemon
//!
//! ## Protocol Architecture
//!
//! - **TCP (port 2206)**: 4-byte control tokens from the host
//! - **UDP (from port 2207)**: Active sample batches, sent to the control
//!   peer's IP at port `peer_port + 1000`
//!
//! Once started, the daemon ends by rebooting the board (or powering it off
//! on `halt`).

use anchor_io::config::AppConfig;
use anchor_io::core::power::create_power;
use anchor_io::core::types::QuitSignal;
use anchor_io::devices::create_radio;
use anchor_io::error::{Error, Result};
use anchor_io::supervisor;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments; flags override the configuration file
#[derive(Parser, Debug)]
#[command(name = "anchor-io")]
#[command(about = "Acquire FMCOMMS5 sample batches and stream active ones to a host")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Radio device ("mock" or "fmcomms5")
    #[arg(short, long)]
    device: Option<String>,

    /// RF bandwidth in Hz
    #[arg(short = 'b', long = "rf-bw")]
    rf_bw: Option<u64>,

    /// RX LO frequency in Hz
    #[arg(short = 'f', long = "cntr-freq")]
    cntr_freq: Option<u64>,

    /// Sample rate in samples/second
    #[arg(short = 'r', long = "samp-rate")]
    samp_rate: Option<u64>,

    /// Batch length in sample rows
    #[arg(short = 'l', long = "buff-len")]
    buff_len: Option<usize>,

    /// Default log filter (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(ref device) = self.device {
            config.radio.device = device.clone();
        }
        if let Some(bw) = self.rf_bw {
            config.radio.rf_bandwidth = bw;
        }
        if let Some(freq) = self.cntr_freq {
            config.radio.center_freq = freq;
        }
        if let Some(rate) = self.samp_rate {
            config.radio.sample_rate = rate;
        }
        if let Some(len) = self.buff_len {
            config.radio.buffer_len = len;
        }
        if let Some(ref level) = self.log_level {
            config.logging.level = level.clone();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    cli.apply(&mut config);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("anchor-io v{} starting...", env!("CARGO_PKG_VERSION"));
    match cli.config {
        Some(ref path) => log::info!("Using config: {}", path.display()),
        None => log::info!("No config file given, using defaults"),
    }

    config.validate()?;
    log::info!(
        "Radio: {} (bw={} Hz, rate={} S/s, lo={} Hz, {} rows per batch)",
        config.radio.device,
        config.radio.rf_bandwidth,
        config.radio.sample_rate,
        config.radio.center_freq,
        config.radio.buffer_len
    );

    let quit = QuitSignal::new();
    let q = quit.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        q.raise();
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let power = create_power(&config.power, &config.radio.device);
    let mut radio = create_radio(&config.radio)?;

    let report = supervisor::run(&config, radio.as_mut(), quit, power.as_ref())?;
    log::info!("anchor-io stopped ({:?})", report.exit);
    Ok(())
}
