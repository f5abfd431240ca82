//! TCP control channel
//!
//! Serves one client connection at a time. Each read of up to four bytes is
//! one token; the token set is closed and anything else ends the connection.
//!
//! # Tokens
//!
//! | Token | Effect | Reply |
//! |-------|--------|-------|
//! | `ping` | none | `ping` |
//! | `blen` | none | batch length in rows, decimal ASCII |
//! | `rate` | none | sample rate, decimal ASCII |
//! | `data` | stream every active batch | none |
//! | `stop` | stream nothing | none |
//! | digits | stream the next N active batches | none |
//! | `halt` | power off (if allowed) | none |
//! | `boot` | reboot | none |
//!
//! Replies carry no terminator. The data destination is always the peer's
//! IP with port `peer_port + data_port_offset`. If that port overflows,
//! `data` and counts close the connection; `stop` still takes effect.
//!
//! # Connection Lifecycle
//!
//! ```text
//! 1. Listener polls accept() non-blocking, sleeping accept_poll_ms between tries
//! 2. A connection is served to completion before the next accept
//! 3. Reads time out every read_timeout_ms to re-check the quit signal
//! 4. EOF, an unknown token or a read error closes the connection
//! 5. halt/boot close the connection and end the server
//! ```

use crate::config::AppConfig;
use crate::core::directive::{DirectiveCell, Remaining, StreamDirective};
use crate::core::power::PowerAction;
use crate::core::types::{ControlCommand, QuitSignal, TOKEN_LEN};
use crate::error::{Error, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

/// Why the command server returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerExit {
    /// A client asked for a power action
    Power(PowerAction),
    /// The quit signal was raised
    Quit,
}

/// What to do after executing one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Write this reply and keep reading
    Reply(String),
    /// Keep reading
    Continue,
    /// Close the connection, keep serving
    Close,
    /// Close the connection and stop serving
    Exit(PowerAction),
}

/// Result of one token read
enum TokenRead {
    Token(usize),
    Eof,
    Quit,
}

/// Control channel server
pub struct CommandServer {
    listener: TcpListener,
    directive: DirectiveCell,
    quit: QuitSignal,
    buffer_len: usize,
    sample_rate: u64,
    data_port_offset: u16,
    allow_halt: bool,
    accept_poll: Duration,
    read_timeout: Duration,
}

impl CommandServer {
    /// Bind the control listener
    pub fn bind(config: &AppConfig, directive: DirectiveCell, quit: QuitSignal) -> Result<Self> {
        let addr = &config.network.control_address;
        let listener = TcpListener::bind(addr)
            .map_err(|e| Error::Other(format!("Failed to bind control port {}: {}", addr, e)))?;
        listener.set_nonblocking(true)?;

        log::info!("Control server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            directive,
            quit,
            buffer_len: config.radio.buffer_len,
            sample_rate: config.radio.sample_rate,
            data_port_offset: config.network.data_port_offset,
            allow_halt: config.power.allow_halt,
            accept_poll: Duration::from_millis(config.network.accept_poll_ms),
            read_timeout: Duration::from_millis(config.network.read_timeout_ms.max(1)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until a power command or quit
    pub fn run(&self) -> ServerExit {
        while !self.quit.is_raised() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    log::info!("Control client connected: {}", peer);
                    let exit = self.serve(&stream, peer);
                    let _ = stream.shutdown(Shutdown::Both);
                    log::info!("Control client disconnected: {}", peer);
                    if let Some(action) = exit {
                        return ServerExit::Power(action);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(self.accept_poll);
                }
                Err(e) => {
                    log::error!("Accept error: {}", e);
                    thread::sleep(self.accept_poll);
                }
            }
        }
        ServerExit::Quit
    }

    /// Serve one connection; returns a power action if one was requested
    fn serve(&self, mut stream: &TcpStream, peer: SocketAddr) -> Option<PowerAction> {
        if let Err(e) = stream
            .set_nonblocking(false)
            .and_then(|_| stream.set_read_timeout(Some(self.read_timeout)))
        {
            log::error!("Failed to configure control socket for {}: {}", peer, e);
            return None;
        }

        let mut token = [0u8; TOKEN_LEN];
        loop {
            let n = match self.read_token(stream, &mut token) {
                Ok(TokenRead::Token(n)) => n,
                Ok(TokenRead::Eof) | Ok(TokenRead::Quit) => return None,
                Err(e) => {
                    log::warn!("Control read from {} failed: {}", peer, e);
                    return None;
                }
            };

            let Some(command) = ControlCommand::parse(&token[..n]) else {
                log::warn!(
                    "Unknown token '{}' from {}, closing",
                    token[..n].escape_ascii(),
                    peer
                );
                return None;
            };
            log::debug!("{} -> {:?}", peer, command);

            match self.execute(command, peer) {
                Outcome::Reply(reply) => {
                    if let Err(e) = stream.write_all(reply.as_bytes()) {
                        log::warn!("Reply to {} failed: {}", peer, e);
                        return None;
                    }
                }
                Outcome::Continue => {}
                Outcome::Close => return None,
                Outcome::Exit(action) => return Some(action),
            }
        }
    }

    /// A single read of up to [`TOKEN_LEN`] bytes
    ///
    /// Timeouts only re-check the quit signal; they never split a token.
    fn read_token(&self, mut stream: &TcpStream, token: &mut [u8; TOKEN_LEN]) -> Result<TokenRead> {
        loop {
            if self.quit.is_raised() {
                return Ok(TokenRead::Quit);
            }
            match stream.read(token) {
                Ok(0) => return Ok(TokenRead::Eof),
                Ok(n) => return Ok(TokenRead::Token(n)),
                Err(ref e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Apply one command on behalf of `peer`
    pub fn execute(&self, command: ControlCommand, peer: SocketAddr) -> Outcome {
        match command {
            ControlCommand::Ping => Outcome::Reply("ping".to_string()),
            ControlCommand::QueryBufferLen => Outcome::Reply(self.buffer_len.to_string()),
            ControlCommand::QueryRate => Outcome::Reply(self.sample_rate.to_string()),
            ControlCommand::StartInfinite => self.direct(peer, Remaining::Infinite),
            ControlCommand::Stop => self.stop(peer),
            ControlCommand::StartN(n) => self.direct(peer, Remaining::Count(n as u64)),
            ControlCommand::PowerHalt if self.allow_halt => {
                log::warn!("Power off requested by {}", peer);
                Outcome::Exit(PowerAction::PowerOff)
            }
            ControlCommand::PowerHalt => {
                log::warn!("Ignoring halt from {}: disabled by configuration", peer);
                Outcome::Close
            }
            ControlCommand::PowerReboot => {
                log::warn!("Reboot requested by {}", peer);
                Outcome::Exit(PowerAction::Reboot)
            }
        }
    }

    /// `stop` always takes effect, even when the peer's data port would overflow
    fn stop(&self, peer: SocketAddr) -> Outcome {
        let destination = data_destination(peer, self.data_port_offset)
            .or(self.directive.snapshot().destination);
        self.directive.set(StreamDirective {
            destination,
            remaining: Remaining::Count(0),
        });
        log::info!("Directive: stopped by {}", peer);
        Outcome::Continue
    }

    fn direct(&self, peer: SocketAddr, remaining: Remaining) -> Outcome {
        let Some(dest) = data_destination(peer, self.data_port_offset) else {
            log::warn!(
                "Peer port {} + {} overflows, closing {}",
                peer.port(),
                self.data_port_offset,
                peer
            );
            return Outcome::Close;
        };
        self.directive.set(StreamDirective::new(dest, remaining));
        log::info!("Directive: {} batches -> {}", remaining, dest);
        Outcome::Continue
    }
}

/// Data channel address for a control peer, `None` if the port overflows
pub fn data_destination(peer: SocketAddr, offset: u16) -> Option<SocketAddr> {
    peer.port()
        .checked_add(offset)
        .map(|port| SocketAddr::new(peer.ip(), port))
}
