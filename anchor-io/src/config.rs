//! Configuration for the anchor daemon
//!
//! Loaded once from a TOML file at startup and handed by reference to the
//! units that need it. Every field has a default, so a partial file (or no
//! file at all) yields a working configuration:
//!
//! ```toml
//! [radio]
//! device = "mock"
//! sample_rate = 50000000
//! buffer_len = 262144
//!
//! [detection]
//! metric = "magnitude"
//! channels = [0]
//! stride = 64
//! threshold = 32
//!
//! [queue]
//! capacity = 128
//! policy = "drop_newest"
//!
//! [network]
//! control_address = "0.0.0.0:2206"
//! data_address = "0.0.0.0:2207"
//! data_port_offset = 1000
//! ```

use crate::acquisition::{DetectionMetric, GateMode, PollMode};
use crate::core::power::PowerBackend;
use crate::devices::mock::config::SimulationConfig;
use crate::error::{Error, Result};
use crate::streaming::BackpressurePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Bytes per scalar sample (signed 16-bit)
pub const SAMPLE_BYTES: usize = 2;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub power: PowerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Radio front end configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RadioConfig {
    /// Device backend: "mock" or "fmcomms5"
    #[serde(default = "default_device")]
    pub device: String,
    /// RF bandwidth in Hz
    #[serde(default = "default_rf_bandwidth")]
    pub rf_bandwidth: u64,
    /// Sampling rate in samples/second
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u64,
    /// RX local oscillator frequency in Hz
    #[serde(default = "default_center_freq")]
    pub center_freq: u64,
    /// Batch length in sample rows per refill
    #[serde(default = "default_buffer_len")]
    pub buffer_len: usize,
    /// Scalar channels per sample row (I and Q count separately)
    #[serde(default = "default_stream_channels")]
    pub stream_channels: usize,
    /// Manual RX hardware gain in dB
    #[serde(default = "default_rx_gain_db")]
    pub rx_gain_db: i32,
    /// AD9361 gain control mode
    #[serde(default = "default_gain_mode")]
    pub gain_mode: String,
    /// Simulated radio parameters (used by the "mock" device only)
    #[serde(default)]
    pub simulation: SimulationConfig,
}

fn default_device() -> String {
    "mock".to_string()
}
fn default_rf_bandwidth() -> u64 {
    56_000_000
}
fn default_sample_rate() -> u64 {
    50_000_000
}
fn default_center_freq() -> u64 {
    2_462_000_000
}
fn default_buffer_len() -> usize {
    1 << 18
}
fn default_stream_channels() -> usize {
    8
}
fn default_rx_gain_db() -> i32 {
    32
}
fn default_gain_mode() -> String {
    "manual".to_string()
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            rf_bandwidth: default_rf_bandwidth(),
            sample_rate: default_sample_rate(),
            center_freq: default_center_freq(),
            buffer_len: default_buffer_len(),
            stream_channels: default_stream_channels(),
            rx_gain_db: default_rx_gain_db(),
            gain_mode: default_gain_mode(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl RadioConfig {
    /// Size in bytes of one acquired batch
    pub fn batch_bytes(&self) -> usize {
        self.buffer_len * self.stream_channels * SAMPLE_BYTES
    }
}

/// Activity detection parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectionConfig {
    /// Whether batches are gated by the detector or all streamed
    #[serde(default)]
    pub gate: GateMode,
    /// Per-sample energy estimate
    #[serde(default)]
    pub metric: DetectionMetric,
    /// Complex channel indices inspected (one or two)
    #[serde(default = "default_detection_channels")]
    pub channels: Vec<usize>,
    /// Inspect every Nth sample row
    #[serde(default = "default_stride")]
    pub stride: usize,
    /// Strictly-greater-than threshold in raw ADC units
    #[serde(default = "default_threshold")]
    pub threshold: u32,
}

fn default_detection_channels() -> Vec<usize> {
    vec![0]
}
fn default_stride() -> usize {
    64
}
fn default_threshold() -> u32 {
    32
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            gate: GateMode::default(),
            metric: DetectionMetric::default(),
            channels: default_detection_channels(),
            stride: default_stride(),
            threshold: default_threshold(),
        }
    }
}

/// Acquisition loop parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    /// Busy-poll or sleep after idle iterations
    #[serde(default)]
    pub poll: PollMode,
    /// Back-off sleep after an inactive iteration (poll = "backoff")
    #[serde(default = "default_backoff_us")]
    pub backoff_us: u64,
    /// Log loop statistics every N iterations (0 disables)
    #[serde(default = "default_stats_interval")]
    pub stats_interval: u64,
}

fn default_backoff_us() -> u64 {
    200
}
fn default_stats_interval() -> u64 {
    65_536
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            poll: PollMode::default(),
            backoff_us: default_backoff_us(),
            stats_interval: default_stats_interval(),
        }
    }
}

impl AcquisitionConfig {
    /// Back-off sleep applied after an inactive iteration, if any
    pub fn idle_backoff(&self) -> Option<Duration> {
        match self.poll {
            PollMode::Busy => None,
            PollMode::Backoff => Some(Duration::from_micros(self.backoff_us)),
        }
    }
}

/// Frame queue parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Maximum queued frames
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// What the producer does when the queue is full
    #[serde(default)]
    pub policy: BackpressurePolicy,
    /// Longest producer wait under the "block" policy
    #[serde(default = "default_block_timeout_ms")]
    pub block_timeout_ms: u64,
}

fn default_capacity() -> usize {
    128
}
fn default_block_timeout_ms() -> u64 {
    50
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            policy: BackpressurePolicy::default(),
            block_timeout_ms: default_block_timeout_ms(),
        }
    }
}

/// Control and data channel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// TCP bind address for the command server
    #[serde(default = "default_control_address")]
    pub control_address: String,
    /// UDP bind address for the data socket
    #[serde(default = "default_data_address")]
    pub data_address: String,
    /// Data port = control peer port + this offset (wire contract)
    #[serde(default = "default_data_port_offset")]
    pub data_port_offset: u16,
    /// Sleep between non-blocking accept attempts
    #[serde(default = "default_accept_poll_ms")]
    pub accept_poll_ms: u64,
    /// Read timeout used to re-check the quit signal on an open connection
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Send a zero-length datagram on active->inactive edges while streaming indefinitely
    #[serde(default = "default_edge_markers")]
    pub edge_markers: bool,
}

fn default_control_address() -> String {
    "0.0.0.0:2206".to_string()
}
fn default_data_address() -> String {
    "0.0.0.0:2207".to_string()
}
fn default_data_port_offset() -> u16 {
    1000
}
fn default_accept_poll_ms() -> u64 {
    10
}
fn default_read_timeout_ms() -> u64 {
    500
}
fn default_edge_markers() -> bool {
    true
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            control_address: default_control_address(),
            data_address: default_data_address(),
            data_port_offset: default_data_port_offset(),
            accept_poll_ms: default_accept_poll_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            edge_markers: default_edge_markers(),
        }
    }
}

/// OS power collaborator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PowerConfig {
    /// "system" runs reboot/poweroff, "log" only logs the request.
    /// Unset: "log" for the mock device, "system" otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<PowerBackend>,
    /// Prefix power commands with sudo
    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,
    /// Accept the `halt` control token
    #[serde(default = "default_allow_halt")]
    pub allow_halt: bool,
}

fn default_use_sudo() -> bool {
    true
}
fn default_allow_halt() -> bool {
    true
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            backend: None,
            use_sudo: default_use_sudo(),
            allow_halt: default_allow_halt(),
        }
    }
}

impl PowerConfig {
    /// Backend to use with the given radio device
    pub fn backend_for(&self, device: &str) -> PowerBackend {
        match self.backend {
            Some(backend) => backend,
            None if device == "mock" => PowerBackend::Log,
            None => PowerBackend::System,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default log filter when RUST_LOG is unset (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use anchor_io::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("/etc/anchor-io.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let radio = &self.radio;
        if radio.buffer_len == 0 {
            return Err(Error::Config("radio.buffer_len must be > 0".to_string()));
        }
        if radio.sample_rate == 0 {
            return Err(Error::Config("radio.sample_rate must be > 0".to_string()));
        }
        if radio.stream_channels == 0 || radio.stream_channels % 2 != 0 {
            return Err(Error::Config(format!(
                "radio.stream_channels must be a positive even number (I/Q pairs), got {}",
                radio.stream_channels
            )));
        }

        let detection = &self.detection;
        if detection.stride == 0 {
            return Err(Error::Config("detection.stride must be > 0".to_string()));
        }
        if detection.channels.is_empty() || detection.channels.len() > 2 {
            return Err(Error::Config(format!(
                "detection.channels must name one or two channels, got {}",
                detection.channels.len()
            )));
        }
        let complex_channels = radio.stream_channels / 2;
        if let Some(bad) = detection.channels.iter().find(|&&c| c >= complex_channels) {
            return Err(Error::Config(format!(
                "detection channel {} out of range (row has {} complex channels)",
                bad, complex_channels
            )));
        }

        if self.queue.capacity == 0 {
            return Err(Error::Config("queue.capacity must be > 0".to_string()));
        }

        for (key, addr) in [
            ("network.control_address", &self.network.control_address),
            ("network.data_address", &self.network.data_address),
        ] {
            addr.parse::<SocketAddr>()
                .map_err(|e| Error::Config(format!("{} '{}': {}", key, addr, e)))?;
        }

        Ok(())
    }
}
