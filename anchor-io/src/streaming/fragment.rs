//! Datagram framing for sample batches
//!
//! A batch of `L` bytes goes out as consecutive datagrams of at most
//! [`MAX_DATAGRAM_PAYLOAD`] bytes, in order, followed by one zero-length
//! datagram that terminates the frame:
//!
//! ```text
//! ┌──────────┬──────────┬─────┬──────────────┬───────┐
//! │ 65507 B  │ 65507 B  │ ... │ L mod 65507 B│ empty │
//! └──────────┴──────────┴─────┴──────────────┴───────┘
//! ```
//!
//! No header, no sequence number. A receiver appends payloads until it sees
//! the empty datagram.

use std::io;
use std::net::{SocketAddr, UdpSocket};

pub const UDP_HEADER_LEN: usize = 8;
pub const IPV4_HEADER_LEN: usize = 20;

/// Largest UDP payload over IPv4 (65507 bytes)
pub const MAX_DATAGRAM_PAYLOAD: usize = u16::MAX as usize - UDP_HEADER_LEN - IPV4_HEADER_LEN;

/// Anything that can send a datagram to an address
///
/// Implemented for [`UdpSocket`]; tests substitute a recording sink.
pub trait DatagramSink: Send {
    fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize>;
}

impl DatagramSink for UdpSocket {
    fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, dest)
    }
}

/// Payload chunks of one frame, terminator excluded
pub fn fragments(data: &[u8]) -> std::slice::Chunks<'_, u8> {
    data.chunks(MAX_DATAGRAM_PAYLOAD)
}

/// Datagrams sent and failed for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    pub datagrams: u64,
    pub bytes: u64,
    pub errors: u64,
}

/// Send one frame: every chunk, then the empty terminator
///
/// A failed send does not abort the frame; the remaining chunks and the
/// terminator are still attempted so the receiver resynchronizes.
pub fn send_frame<S: DatagramSink + ?Sized>(sink: &S, data: &[u8], dest: SocketAddr) -> SendReport {
    let mut report = SendReport::default();
    for chunk in fragments(data).chain(std::iter::once(&[][..])) {
        match sink.send_to(chunk, dest) {
            Ok(n) => {
                log::trace!("Sent {} bytes to {}", n, dest);
                report.datagrams += 1;
                report.bytes += n as u64;
            }
            Err(e) => {
                report.errors += 1;
                log::debug!("send_to {} failed ({} bytes): {}", dest, chunk.len(), e);
            }
        }
    }
    report
}
