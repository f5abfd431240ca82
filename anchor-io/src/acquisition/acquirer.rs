//! Buffer acquisition loop
//!
//! Runs on its own thread and never touches the network:
//!
//! ```text
//! ┌────────────┐ refill ┌────────────────┐ Frame ┌────────────┐
//! │  RxStream  │───────▶│ BufferAcquirer │──────▶│ FrameQueue │
//! │ (hardware) │        │   + detector   │       │ (bounded)  │
//! └────────────┘        └────────────────┘       └────────────┘
//! ```
//!
//! Each iteration refills the hardware buffer, checks the overflow flag,
//! runs the activity detector and, for an active batch, pushes an owned copy
//! onto the frame queue. An active-to-inactive transition additionally pushes
//! a [`Frame::BatchEnd`] marker.

use crate::core::radio::RxStream;
use crate::core::types::{Frame, QuitSignal, SampleBatch};
use crate::error::{Error, Result};
use crate::streaming::queue::{FrameProducer, PushOutcome};

use super::detector::ActivityDetector;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

/// How the loop behaves between inactive refills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollMode {
    /// Refill again immediately (the refill itself blocks on DMA)
    #[default]
    Busy,
    /// Sleep `backoff_us` after each inactive iteration
    Backoff,
}

/// Counters kept by the acquisition loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub iterations: u64,
    pub active: u64,
    pub queued: u64,
    pub dropped: u64,
    pub edges: u64,
    pub overflows: u64,
}

/// Owns the RX stream and decides which batches leave it
pub struct BufferAcquirer {
    stream: Box<dyn RxStream>,
    detector: ActivityDetector,
    batch_bytes: usize,
}

impl BufferAcquirer {
    pub fn new(stream: Box<dyn RxStream>, detector: ActivityDetector, batch_bytes: usize) -> Self {
        Self {
            stream,
            detector,
            batch_bytes,
        }
    }

    /// Block until the next hardware buffer is complete
    pub fn refill(&mut self) -> Result<()> {
        self.stream.refill()?;
        let len = self.stream.samples().len();
        if len != self.batch_bytes {
            return Err(Error::Radio(format!(
                "refill returned {} bytes, expected {}",
                len, self.batch_bytes
            )));
        }
        Ok(())
    }

    /// Whether samples were lost since the previous check
    pub fn overflowed(&mut self) -> Result<bool> {
        self.stream.overflowed()
    }

    /// Run the detector over the current buffer
    pub fn is_active(&self) -> bool {
        self.detector.is_active(self.stream.samples())
    }

    /// Owned copy of the current buffer
    pub fn read(&self) -> Vec<u8> {
        self.stream.read()
    }
}

/// The acquisition unit: drives a [`BufferAcquirer`] until quit
pub struct AcquisitionLoop {
    acquirer: BufferAcquirer,
    producer: FrameProducer,
    quit: QuitSignal,
    idle_backoff: Option<Duration>,
    stats_interval: u64,
    stats: AcquisitionStats,
    was_active: bool,
}

impl AcquisitionLoop {
    pub fn new(
        acquirer: BufferAcquirer,
        producer: FrameProducer,
        quit: QuitSignal,
        idle_backoff: Option<Duration>,
        stats_interval: u64,
    ) -> Self {
        Self {
            acquirer,
            producer,
            quit,
            idle_backoff,
            stats_interval,
            stats: AcquisitionStats::default(),
            was_active: false,
        }
    }

    /// Run until the quit signal is raised
    ///
    /// Returns an error when the radio fails or the consumer side of the queue
    /// has gone away. The producer is dropped on return, which closes the
    /// queue for the stream sender.
    pub fn run(mut self) -> Result<AcquisitionStats> {
        log::info!("Acquisition loop started");
        let started = Instant::now();

        while !self.quit.is_raised() {
            self.step()?;

            if self.stats_interval > 0 && self.stats.iterations % self.stats_interval == 0 {
                self.log_stats(started);
            }
        }

        log::info!(
            "Acquisition loop stopped after {} iterations ({} queued, {} dropped, {} overflows)",
            self.stats.iterations,
            self.stats.queued,
            self.stats.dropped,
            self.stats.overflows
        );
        Ok(self.stats)
    }

    /// One refill/detect/enqueue iteration
    pub fn step(&mut self) -> Result<()> {
        self.stats.iterations += 1;
        let iteration = self.stats.iterations;

        self.acquirer.refill()?;

        if self.acquirer.overflowed()? {
            self.stats.overflows += 1;
            if self.stats.overflows == 1 {
                log::warn!("Iteration {}: RX overflow, samples lost", iteration);
            } else {
                log::debug!("Iteration {}: RX overflow", iteration);
            }
        }

        let active = self.acquirer.is_active();
        if active {
            self.stats.active += 1;
            let batch = SampleBatch::new(iteration, self.acquirer.read());
            self.push(Frame::Batch(batch))?;
        } else {
            if self.was_active {
                self.stats.edges += 1;
                self.push(Frame::BatchEnd)?;
            }
            if let Some(backoff) = self.idle_backoff {
                thread::sleep(backoff);
            }
        }
        self.was_active = active;

        Ok(())
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    fn push(&mut self, frame: Frame) -> Result<()> {
        match self.producer.push(frame) {
            PushOutcome::Queued => {
                self.stats.queued += 1;
                Ok(())
            }
            PushOutcome::Dropped => {
                self.stats.dropped += 1;
                if self.stats.dropped == 1 {
                    log::warn!("Frame queue full, dropping newest frames");
                } else {
                    log::debug!("Frame queue full ({} dropped)", self.stats.dropped);
                }
                Ok(())
            }
            PushOutcome::Closed => Err(Error::Other(
                "frame queue closed by stream sender".to_string(),
            )),
        }
    }

    fn log_stats(&self, started: Instant) {
        let elapsed = started.elapsed();
        let per_iter_ms = elapsed.as_secs_f64() * 1000.0 / self.stats.iterations as f64;
        log::info!(
            "Runtime {:.1} s, {:.3} ms/iteration, {} active, {} queued, {} dropped, {} overflows",
            elapsed.as_secs_f64(),
            per_iter_ms,
            self.stats.active,
            self.stats.queued,
            self.stats.dropped,
            self.stats.overflows
        );
    }
}
