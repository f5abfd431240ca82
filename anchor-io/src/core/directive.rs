//! Single-slot streaming directive
//!
//! The command server writes, the stream sender reads and decrements. A new
//! command always replaces the previous directive; there is no queue of
//! pending instructions.

use parking_lot::Mutex;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// How many more active batches may be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Count(u64),
    Infinite,
}

impl Remaining {
    pub fn is_zero(&self) -> bool {
        matches!(self, Remaining::Count(0))
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remaining::Count(n) => write!(f, "{}", n),
            Remaining::Infinite => write!(f, "inf"),
        }
    }
}

/// Where and how much to stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDirective {
    /// Data channel destination; `None` until a client has issued a command
    pub destination: Option<SocketAddr>,
    pub remaining: Remaining,
}

impl StreamDirective {
    /// The state before any command: nowhere to send, nothing to send
    pub const IDLE: StreamDirective = StreamDirective {
        destination: None,
        remaining: Remaining::Count(0),
    };

    pub fn new(destination: SocketAddr, remaining: Remaining) -> Self {
        Self {
            destination: Some(destination),
            remaining,
        }
    }

    /// Streaming indefinitely to a known destination
    pub fn is_continuous(&self) -> bool {
        self.destination.is_some() && self.remaining == Remaining::Infinite
    }
}

impl Default for StreamDirective {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Shared handle to the active directive
#[derive(Debug, Clone, Default)]
pub struct DirectiveCell {
    inner: Arc<Mutex<StreamDirective>>,
}

impl DirectiveCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active directive (last write wins)
    pub fn set(&self, directive: StreamDirective) {
        *self.inner.lock() = directive;
    }

    /// Copy of the active directive
    pub fn snapshot(&self) -> StreamDirective {
        *self.inner.lock()
    }

    /// Claim permission to send one frame
    ///
    /// Returns the destination and decrements a finite count, atomically with
    /// the guard check. Returns `None` (and changes nothing) when there is no
    /// destination or the count is zero.
    pub fn claim(&self) -> Option<SocketAddr> {
        let mut directive = self.inner.lock();
        let destination = directive.destination?;
        match directive.remaining {
            Remaining::Infinite => Some(destination),
            Remaining::Count(0) => None,
            Remaining::Count(n) => {
                directive.remaining = Remaining::Count(n - 1);
                Some(destination)
            }
        }
    }

    /// Destination for an activity-edge marker, if streaming indefinitely
    pub fn continuous_destination(&self) -> Option<SocketAddr> {
        let directive = self.inner.lock();
        if directive.is_continuous() {
            directive.destination
        } else {
            None
        }
    }
}
