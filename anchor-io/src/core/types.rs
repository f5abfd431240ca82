//! Core data types for sample batches, queue frames and control commands.
//!
//! Key types:
//! - [`SampleBatch`]: Owned copy of one hardware buffer
//! - [`Frame`]: Item carried by the frame queue
//! - [`ControlCommand`]: Closed set of control tokens
//! - [`QuitSignal`]: Cooperative process-wide shutdown flag

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Length of a control token in bytes
pub const TOKEN_LEN: usize = 4;

/// One acquired batch, copied out of the hardware buffer
///
/// Interleaved little-endian i16 samples, `stream_channels` scalars per row.
/// Immutable once queued.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    /// Acquisition iteration that produced the batch
    pub sequence: u64,
    /// Wall-clock acquisition time (microseconds since UNIX epoch)
    pub timestamp_us: u64,
    pub data: Vec<u8>,
}

impl SampleBatch {
    pub fn new(sequence: u64, data: Vec<u8>) -> Self {
        let timestamp_us = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self {
            sequence,
            timestamp_us,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Item handed from the acquisition loop to the stream sender
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// An active batch
    Batch(SampleBatch),
    /// The signal went from active to inactive
    BatchEnd,
}

/// Commands accepted on the control channel
///
/// The token set is closed: anything that does not parse ends the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// `ping`: echo back
    Ping,
    /// `blen`: reply with the configured batch length
    QueryBufferLen,
    /// `rate`: reply with the configured sample rate
    QueryRate,
    /// `data`: stream every active batch until told otherwise
    StartInfinite,
    /// `stop`: stream nothing
    Stop,
    /// All-digit token: stream the next N active batches
    StartN(u32),
    /// `halt`: power the anchor off
    PowerHalt,
    /// `boot`: reboot the anchor
    PowerReboot,
}

impl ControlCommand {
    /// Parse a token read from the control connection
    ///
    /// Returns `None` for empty, oversized or unknown tokens. A read shorter
    /// than [`TOKEN_LEN`] is only valid when it is all digits.
    pub fn parse(token: &[u8]) -> Option<Self> {
        if token.is_empty() || token.len() > TOKEN_LEN {
            return None;
        }

        match token {
            b"ping" => Some(Self::Ping),
            b"blen" => Some(Self::QueryBufferLen),
            b"rate" => Some(Self::QueryRate),
            b"data" => Some(Self::StartInfinite),
            b"stop" => Some(Self::Stop),
            b"halt" => Some(Self::PowerHalt),
            b"boot" => Some(Self::PowerReboot),
            digits if digits.iter().all(u8::is_ascii_digit) => std::str::from_utf8(digits)
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Self::StartN),
            _ => None,
        }
    }
}

/// Process-wide cooperative quit flag
///
/// Observed at the top of each loop iteration; never interrupts an in-flight
/// refill or send.
#[derive(Debug, Clone, Default)]
pub struct QuitSignal {
    flag: Arc<AtomicBool>,
}

impl QuitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every unit to stop after its current iteration
    pub fn raise(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_words() {
        assert_eq!(ControlCommand::parse(b"ping"), Some(ControlCommand::Ping));
        assert_eq!(
            ControlCommand::parse(b"blen"),
            Some(ControlCommand::QueryBufferLen)
        );
        assert_eq!(ControlCommand::parse(b"rate"), Some(ControlCommand::QueryRate));
        assert_eq!(
            ControlCommand::parse(b"data"),
            Some(ControlCommand::StartInfinite)
        );
        assert_eq!(ControlCommand::parse(b"stop"), Some(ControlCommand::Stop));
        assert_eq!(ControlCommand::parse(b"halt"), Some(ControlCommand::PowerHalt));
        assert_eq!(
            ControlCommand::parse(b"boot"),
            Some(ControlCommand::PowerReboot)
        );
    }

    #[test]
    fn test_parse_counts() {
        assert_eq!(ControlCommand::parse(b"5"), Some(ControlCommand::StartN(5)));
        assert_eq!(ControlCommand::parse(b"0042"), Some(ControlCommand::StartN(42)));
        assert_eq!(
            ControlCommand::parse(b"9999"),
            Some(ControlCommand::StartN(9999))
        );
        assert_eq!(ControlCommand::parse(b"0"), Some(ControlCommand::StartN(0)));
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(ControlCommand::parse(b""), None);
        assert_eq!(ControlCommand::parse(b"pin"), None);
        assert_eq!(ControlCommand::parse(b"PING"), None);
        assert_eq!(ControlCommand::parse(b"12a4"), None);
        assert_eq!(ControlCommand::parse(b"-1"), None);
        assert_eq!(ControlCommand::parse(b"5\n"), None);
        assert_eq!(ControlCommand::parse(b"pings"), None);
    }

    #[test]
    fn test_quit_signal_shared_between_clones() {
        let quit = QuitSignal::new();
        let other = quit.clone();
        assert!(!other.is_raised());
        quit.raise();
        assert!(other.is_raised());
    }

    #[test]
    fn test_sample_batch_len() {
        let batch = SampleBatch::new(3, vec![0u8; 16]);
        assert_eq!(batch.sequence, 3);
        assert_eq!(batch.len(), 16);
        assert!(!batch.is_empty());
    }
}
