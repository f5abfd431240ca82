//! Simulated radio for hardware-free operation and testing
//!
//! Produces buffers in the same layout as the FMCOMMS5 stream (interleaved
//! little-endian i16, `stream_channels` scalars per row):
//!
//! | Batch kind | Content |
//! |------------|---------|
//! | Idle | Gaussian noise at `noise_stddev` |
//! | Active | Complex tone at `burst_amplitude` on every channel |
//!
//! Whether a batch is active comes from `activity_pattern` (cycled) when one
//! is configured, otherwise from `burst_probability`. Overflows are reported
//! on a fixed cadence (`overflow_every`), so tests can predict them exactly.
//!
//! With `realtime = true` each refill is paced to the duration of one buffer
//! at the configured sample rate, like a DMA buffer completing.

pub mod config;
pub mod noise;

use crate::core::radio::{RadioCollaborator, RadioSettings, RxStream};
use crate::error::{Error, Result};

use config::SimulationConfig;
use noise::{NoiseGenerator, saturate};

use std::f32::consts::TAU;
use std::thread;
use std::time::{Duration, Instant};

/// Tone frequency as a fraction of the sample rate
const TONE_CYCLES_PER_SAMPLE: f32 = 0.01;

/// Per-chip calibration flags, only meaningful while synchronizing
#[derive(Debug, Clone, Default)]
pub struct SynchronizationState {
    pub calibrating: Vec<bool>,
}

/// Simulated multi-chip radio
pub struct MockRadio {
    config: SimulationConfig,
    settings: Option<RadioSettings>,
    sync_state: SynchronizationState,
    synchronized: bool,
}

impl MockRadio {
    pub fn new(config: SimulationConfig) -> Self {
        let chips = config.chips;
        Self {
            config,
            settings: None,
            sync_state: SynchronizationState {
                calibrating: vec![false; chips],
            },
            synchronized: false,
        }
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    pub fn sync_state(&self) -> &SynchronizationState {
        &self.sync_state
    }
}

impl RadioCollaborator for MockRadio {
    fn name(&self) -> &str {
        "mock"
    }

    fn configure(&mut self, settings: &RadioSettings) -> Result<()> {
        if settings.sample_rate == 0 {
            return Err(Error::InvalidParameter("sample_rate must be > 0".to_string()));
        }
        log::info!(
            "Mock radio: bw={} Hz rate={} S/s lo={} Hz gain={} dB ({})",
            settings.rf_bandwidth,
            settings.sample_rate,
            settings.center_freq,
            settings.rx_gain_db,
            settings.gain_mode
        );
        self.settings = Some(settings.clone());
        self.synchronized = false;
        Ok(())
    }

    fn synchronize(&mut self) -> Result<()> {
        if self.settings.is_none() {
            return Err(Error::Radio(
                "synchronize called before configure".to_string(),
            ));
        }

        for chip in 0..self.sync_state.calibrating.len() {
            self.sync_state.calibrating[chip] = true;
            log::debug!("Mock radio: chip {} entering calibration", chip);
        }
        for flag in self.sync_state.calibrating.iter_mut() {
            *flag = false;
        }

        self.synchronized = true;
        log::info!(
            "Mock radio: {} chips synchronized",
            self.sync_state.calibrating.len()
        );
        Ok(())
    }

    fn create_stream(&mut self, batch_len: usize) -> Result<Box<dyn RxStream>> {
        let settings = self.settings.as_ref().ok_or_else(|| {
            Error::Radio("create_stream called before configure".to_string())
        })?;
        if batch_len == 0 {
            return Err(Error::InvalidParameter("batch_len must be > 0".to_string()));
        }

        let period = if self.config.realtime {
            Some(Duration::from_secs_f64(
                batch_len as f64 / settings.sample_rate as f64,
            ))
        } else {
            None
        };

        Ok(Box::new(MockStream::new(
            self.config.clone(),
            batch_len,
            settings.stream_channels,
            period,
        )))
    }
}

/// Simulated RX buffer
pub struct MockStream {
    config: SimulationConfig,
    noise: NoiseGenerator,
    buffer: Vec<u8>,
    rows: usize,
    stream_channels: usize,
    period: Option<Duration>,
    next_deadline: Option<Instant>,
    refills: u64,
    overflow: bool,
    phase: f32,
}

impl MockStream {
    fn new(
        config: SimulationConfig,
        rows: usize,
        stream_channels: usize,
        period: Option<Duration>,
    ) -> Self {
        let noise = NoiseGenerator::new(config.seed);
        Self {
            config,
            noise,
            buffer: vec![0u8; rows * stream_channels * 2],
            rows,
            stream_channels,
            period,
            next_deadline: None,
            refills: 0,
            overflow: false,
            phase: 0.0,
        }
    }

    /// Number of refills performed so far
    pub fn refills(&self) -> u64 {
        self.refills
    }

    fn next_is_active(&mut self) -> bool {
        let pattern = &self.config.activity_pattern;
        if pattern.is_empty() {
            let p = self.config.burst_probability;
            self.noise.chance(p)
        } else {
            pattern[((self.refills - 1) % pattern.len() as u64) as usize]
        }
    }

    fn write_tone(&mut self) {
        let amplitude = self.config.burst_amplitude;
        let row_bytes = self.stream_channels * 2;
        for row in 0..self.rows {
            let (sin, cos) = self.phase.sin_cos();
            let i = saturate(amplitude * cos).to_le_bytes();
            let q = saturate(amplitude * sin).to_le_bytes();
            let base = row * row_bytes;
            for pair in self.buffer[base..base + row_bytes].chunks_exact_mut(4) {
                pair[..2].copy_from_slice(&i);
                pair[2..].copy_from_slice(&q);
            }
            self.phase = (self.phase + TAU * TONE_CYCLES_PER_SAMPLE) % TAU;
        }
    }

    fn pace(&mut self) {
        let Some(period) = self.period else {
            return;
        };
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now + period);
        if deadline > now {
            thread::sleep(deadline - now);
        }
        // Fall behind gracefully rather than bursting to catch up
        self.next_deadline = Some(deadline.max(now) + period);
    }
}

impl RxStream for MockStream {
    fn refill(&mut self) -> Result<()> {
        self.pace();
        self.refills += 1;

        if self.next_is_active() {
            self.write_tone();
        } else {
            let stddev = self.config.noise_stddev;
            self.noise.fill_i16(&mut self.buffer, stddev);
        }

        let every = self.config.overflow_every;
        self.overflow = every > 0 && self.refills % every == 0;
        Ok(())
    }

    fn overflowed(&mut self) -> Result<bool> {
        Ok(self.overflow)
    }

    fn samples(&self) -> &[u8] {
        &self.buffer
    }
}
