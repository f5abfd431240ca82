//! Stream sender: drains the frame queue onto the data socket
//!
//! For every active batch the sender claims one unit from the directive
//! cell. A successful claim yields the destination and the batch goes out
//! as fragmented datagrams; otherwise the batch is discarded. Sending never
//! blocks acquisition, and a failed datagram never stops the loop.
//!
//! [`Frame::BatchEnd`] markers become a lone zero-length datagram, but only
//! while streaming indefinitely. Counted streaming ignores them, so a client
//! asking for N batches receives exactly N frames.

use crate::core::directive::DirectiveCell;
use crate::core::types::{Frame, SampleBatch};
use crate::streaming::fragment::{DatagramSink, send_frame};
use crate::streaming::queue::FrameConsumer;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Interval between periodic totals in the log
const STATS_PERIOD: Duration = Duration::from_secs(10);

/// Counters kept by the stream sender
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Batches sent to a client
    pub frames: u64,
    /// Batches discarded because the directive did not allow sending
    pub discarded: u64,
    pub datagrams: u64,
    pub bytes: u64,
    pub edge_markers: u64,
    pub send_errors: u64,
}

/// Consumes frames and emits datagrams
pub struct StreamSender<S: DatagramSink> {
    sink: S,
    directive: DirectiveCell,
    edge_markers: bool,
    last_destination: Option<SocketAddr>,
    stats: SenderStats,
}

impl<S: DatagramSink> StreamSender<S> {
    pub fn new(sink: S, directive: DirectiveCell, edge_markers: bool) -> Self {
        Self {
            sink,
            directive,
            edge_markers,
            last_destination: None,
            stats: SenderStats::default(),
        }
    }

    /// Drain the queue until the producer closes it
    ///
    /// Frames already queued when acquisition stops are still handled.
    pub fn run(mut self, consumer: FrameConsumer) -> SenderStats {
        log::info!("Stream sender started");
        let mut last_stats = Instant::now();

        while let Some(frame) = consumer.recv() {
            self.handle(frame);

            if last_stats.elapsed() >= STATS_PERIOD {
                log::info!(
                    "Sender: {} frames, {} datagrams, {} discarded, {} send errors",
                    self.stats.frames,
                    self.stats.datagrams,
                    self.stats.discarded,
                    self.stats.send_errors
                );
                last_stats = Instant::now();
            }
        }

        log::info!(
            "Stream sender stopped: {} frames ({} datagrams, {} bytes), {} discarded, {} send errors",
            self.stats.frames,
            self.stats.datagrams,
            self.stats.bytes,
            self.stats.discarded,
            self.stats.send_errors
        );
        self.stats
    }

    /// Handle a single frame
    pub fn handle(&mut self, frame: Frame) {
        match frame {
            Frame::Batch(batch) => self.send_batch(&batch),
            Frame::BatchEnd => self.send_edge_marker(),
        }
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    fn send_batch(&mut self, batch: &SampleBatch) {
        let Some(dest) = self.directive.claim() else {
            self.stats.discarded += 1;
            return;
        };

        if self.last_destination != Some(dest) {
            log::info!("Streaming to {}", dest);
            self.last_destination = Some(dest);
        }

        let report = send_frame(&self.sink, &batch.data, dest);
        self.stats.frames += 1;
        self.stats.datagrams += report.datagrams;
        self.stats.bytes += report.bytes;
        if report.errors > 0 {
            self.stats.send_errors += report.errors;
            log::debug!(
                "Batch {}: {} of {} datagrams to {} failed",
                batch.sequence,
                report.errors,
                report.errors + report.datagrams,
                dest
            );
        }
    }

    fn send_edge_marker(&mut self) {
        if !self.edge_markers {
            return;
        }
        let Some(dest) = self.directive.continuous_destination() else {
            return;
        };
        match self.sink.send_to(&[], dest) {
            Ok(_) => {
                self.stats.edge_markers += 1;
                self.stats.datagrams += 1;
            }
            Err(e) => {
                self.stats.send_errors += 1;
                log::debug!("Edge marker to {} failed: {}", dest, e);
            }
        }
    }
}
