//! Acquisition unit: refill, detect, enqueue

pub mod acquirer;
pub mod detector;

pub use acquirer::{AcquisitionLoop, AcquisitionStats, BufferAcquirer, PollMode};
pub use detector::{ActivityDetector, DetectionMetric, GateMode};
