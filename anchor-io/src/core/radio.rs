//! Radio collaborator traits
//!
//! The acquisition pipeline only ever talks to hardware through these two
//! traits. Startup (`configure`, `synchronize`, `create_stream`) happens on the
//! supervisor thread; the returned [`RxStream`] is then moved into the
//! acquisition thread and polled there.

use crate::config::RadioConfig;
use crate::error::Result;

/// Front end settings applied by [`RadioCollaborator::configure`]
#[derive(Debug, Clone, PartialEq)]
pub struct RadioSettings {
    /// RF bandwidth in Hz
    pub rf_bandwidth: u64,
    /// Sampling rate in samples/second
    pub sample_rate: u64,
    /// RX LO frequency in Hz
    pub center_freq: u64,
    /// Manual RX gain in dB
    pub rx_gain_db: i32,
    /// Gain control mode understood by the driver
    pub gain_mode: String,
    /// Scalar channels enabled in the stream
    pub stream_channels: usize,
}

impl From<&RadioConfig> for RadioSettings {
    fn from(config: &RadioConfig) -> Self {
        Self {
            rf_bandwidth: config.rf_bandwidth,
            sample_rate: config.sample_rate,
            center_freq: config.center_freq,
            rx_gain_db: config.rx_gain_db,
            gain_mode: config.gain_mode.clone(),
            stream_channels: config.stream_channels,
        }
    }
}

/// Radio device abstraction
pub trait RadioCollaborator: Send {
    /// Human-readable device name for logs
    fn name(&self) -> &str;

    /// Apply bandwidth, sample rate, LO frequency and gain
    fn configure(&mut self, settings: &RadioSettings) -> Result<()>;

    /// Run the multi-chip timing and phase calibration
    ///
    /// Any non-zero driver status is an error; the daemon must not stream
    /// from an unsynchronized front end.
    fn synchronize(&mut self) -> Result<()>;

    /// Create the RX stream holding `batch_len` sample rows per refill
    fn create_stream(&mut self, batch_len: usize) -> Result<Box<dyn RxStream>>;
}

/// A hardware RX buffer that is refilled in place
pub trait RxStream: Send {
    /// Block until the buffer is full; driver failures are returned, not retried
    fn refill(&mut self) -> Result<()>;

    /// True when samples were dropped since the previous refill
    fn overflowed(&mut self) -> Result<bool>;

    /// Borrow the current buffer contents
    ///
    /// Only valid until the next `refill`.
    fn samples(&self) -> &[u8];

    /// Copy the current buffer contents out of hardware memory
    fn read(&self) -> Vec<u8> {
        self.samples().to_vec()
    }
}
