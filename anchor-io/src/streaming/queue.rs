//! Bounded frame queue between acquisition and the stream sender
//!
//! Single producer, single consumer, FIFO. The producer never blocks
//! indefinitely: under `drop_newest` a full queue drops the frame at once,
//! under `block` the producer waits up to `block_timeout_ms` and then drops.
//! Dropping the [`FrameProducer`] closes the queue; the consumer still drains
//! whatever is left before seeing the close.

use crate::config::QueueConfig;
use crate::core::types::Frame;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Producer behaviour when the queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Drop the frame being pushed
    #[default]
    DropNewest,
    /// Wait up to the configured timeout, then drop
    Block,
}

/// Result of a push attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    Dropped,
    /// The consumer is gone
    Closed,
}

/// Create a connected producer/consumer pair
pub fn frame_queue(config: &QueueConfig) -> (FrameProducer, FrameConsumer) {
    let (tx, rx) = bounded(config.capacity);
    (
        FrameProducer {
            tx,
            policy: config.policy,
            block_timeout: Duration::from_millis(config.block_timeout_ms),
        },
        FrameConsumer { rx },
    )
}

/// Acquisition side of the queue
pub struct FrameProducer {
    tx: Sender<Frame>,
    policy: BackpressurePolicy,
    block_timeout: Duration,
}

impl FrameProducer {
    pub fn push(&self, frame: Frame) -> PushOutcome {
        match self.policy {
            BackpressurePolicy::DropNewest => match self.tx.try_send(frame) {
                Ok(()) => PushOutcome::Queued,
                Err(TrySendError::Full(_)) => PushOutcome::Dropped,
                Err(TrySendError::Disconnected(_)) => PushOutcome::Closed,
            },
            BackpressurePolicy::Block => match self.tx.send_timeout(frame, self.block_timeout) {
                Ok(()) => PushOutcome::Queued,
                Err(SendTimeoutError::Timeout(_)) => PushOutcome::Dropped,
                Err(SendTimeoutError::Disconnected(_)) => PushOutcome::Closed,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Stream sender side of the queue
pub struct FrameConsumer {
    rx: Receiver<Frame>,
}

impl FrameConsumer {
    /// Wait for the next frame; `None` once the queue is closed and empty
    pub fn recv(&self) -> Option<Frame> {
        self.rx.recv().ok()
    }

    /// Next frame if one is ready
    pub fn try_recv(&self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
