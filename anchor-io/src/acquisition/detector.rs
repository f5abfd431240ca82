//! Coarse activity detection over a strided subsample
//!
//! Only every `stride`-th sample row of one or two complex channels is
//! inspected. At 50 MS/s a full pass over every buffer would cost more than
//! the refill itself; a strided peak test still catches any burst that spans
//! more than `stride` samples.

use crate::config::DetectionConfig;
use serde::{Deserialize, Serialize};

/// Per-sample energy estimate compared against the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMetric {
    /// Complex magnitude sqrt(I² + Q²)
    #[default]
    Magnitude,
    /// Signed in-phase component only
    InPhase,
}

/// Whether batches pass through the detector at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Only batches the detector marks active are streamed
    #[default]
    Activity,
    /// Every batch counts as active
    Always,
}

/// Strided peak detector
#[derive(Debug, Clone)]
pub struct ActivityDetector {
    gate: GateMode,
    metric: DetectionMetric,
    /// Complex channel indices
    channels: Vec<usize>,
    stride: usize,
    threshold: u32,
    /// Scalars (I or Q) per sample row
    row_scalars: usize,
}

impl ActivityDetector {
    pub fn new(config: &DetectionConfig, stream_channels: usize) -> Self {
        Self {
            gate: config.gate,
            metric: config.metric,
            channels: config.channels.clone(),
            stride: config.stride.max(1),
            threshold: config.threshold,
            row_scalars: stream_channels,
        }
    }

    /// True iff some inspected sample exceeds the threshold (strictly)
    pub fn is_active(&self, buf: &[u8]) -> bool {
        if self.gate == GateMode::Always {
            return true;
        }

        let row_bytes = self.row_scalars * 2;
        if row_bytes == 0 {
            return false;
        }
        let rows = buf.len() / row_bytes;

        (0..rows).step_by(self.stride).any(|row| {
            let base = row * row_bytes;
            self.channels
                .iter()
                .any(|&ch| self.exceeds(&buf[base + ch * 4..base + ch * 4 + 4]))
        })
    }

    /// `iq` holds one complex sample: I then Q, little-endian i16
    #[inline]
    fn exceeds(&self, iq: &[u8]) -> bool {
        let i = i16::from_le_bytes([iq[0], iq[1]]) as i64;
        match self.metric {
            DetectionMetric::InPhase => i > self.threshold as i64,
            DetectionMetric::Magnitude => {
                let q = i16::from_le_bytes([iq[2], iq[3]]) as i64;
                let t = self.threshold as i64;
                i * i + q * q > t * t
            }
        }
    }
}
