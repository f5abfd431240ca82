//! Test harness: a running anchor on loopback plus a host-side client
//!
//! The anchor runs with the simulated radio, so every test exercises the
//! real acquisition, queue, sender and control threads over real sockets.

use anchor_io::config::AppConfig;
use anchor_io::core::directive::{DirectiveCell, StreamDirective};
use anchor_io::core::power::{PowerAction, PowerControl};
use anchor_io::core::types::QuitSignal;
use anchor_io::devices::mock::MockRadio;
use anchor_io::{Anchor, ShutdownReport};
use parking_lot::Mutex;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Read timeout for replies and datagrams
pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Rows per batch in the default harness configuration
pub const ROWS: usize = 256;

/// Loopback configuration with a fast, deterministic mock radio
///
/// Every batch is active and each refill takes about one millisecond.
pub fn anchor_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.network.control_address = "127.0.0.1:0".to_string();
    config.network.data_address = "127.0.0.1:0".to_string();
    config.network.read_timeout_ms = 50;
    config.radio.buffer_len = ROWS;
    config.radio.sample_rate = 256_000;
    config.radio.simulation.seed = 42;
    config.radio.simulation.activity_pattern = vec![true];
    config.radio.simulation.realtime = true;
    config.acquisition.stats_interval = 0;
    config
}

/// Records requested power actions instead of performing them
#[derive(Default)]
pub struct RecordingPower {
    pub actions: Mutex<Vec<PowerAction>>,
}

impl PowerControl for RecordingPower {
    fn reboot(&self) {
        self.actions.lock().push(PowerAction::Reboot);
    }

    fn power_off(&self) {
        self.actions.lock().push(PowerAction::PowerOff);
    }
}

/// Anchor running on a background thread
pub struct TestAnchor {
    pub control: SocketAddr,
    pub quit: QuitSignal,
    pub batch_bytes: usize,
    pub directive: DirectiveCell,
    handle: JoinHandle<ShutdownReport>,
}

impl TestAnchor {
    pub fn start(config: AppConfig) -> Self {
        let quit = QuitSignal::new();
        let mut radio = MockRadio::new(config.radio.simulation.clone());
        let anchor = Anchor::start(&config, &mut radio, quit.clone()).unwrap();
        let control = anchor.control_addr().unwrap();
        let directive = anchor.directive().clone();
        let handle = thread::spawn(move || anchor.run());
        Self {
            control,
            quit,
            batch_bytes: config.radio.batch_bytes(),
            directive,
            handle,
        }
    }

    pub fn client(&self) -> Client {
        Client::connect(self.control)
    }

    /// Poll the directive until it matches `expected` or the timeout passes
    pub fn wait_for_directive(&self, expected: StreamDirective) -> bool {
        let deadline = Instant::now() + RECV_TIMEOUT;
        while Instant::now() < deadline {
            if self.directive.snapshot() == expected {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    /// Wait for the anchor to stop on its own
    pub fn join(self) -> ShutdownReport {
        self.handle.join().unwrap()
    }

    /// Raise quit and wait for the anchor to stop
    pub fn stop(self) -> ShutdownReport {
        self.quit.raise();
        self.join()
    }
}

/// Host side: control connection plus the UDP socket the anchor streams to
pub struct Client {
    pub control: TcpStream,
    pub data: UdpSocket,
}

impl Client {
    pub fn connect(addr: SocketAddr) -> Self {
        let control = TcpStream::connect(addr).unwrap();
        control.set_read_timeout(Some(RECV_TIMEOUT)).unwrap();
        let port = control.local_addr().unwrap().port() + 1000;
        let data = UdpSocket::bind(("127.0.0.1", port)).unwrap();
        data.set_read_timeout(Some(RECV_TIMEOUT)).unwrap();
        Self { control, data }
    }

    /// Send a token that has no reply
    pub fn send(&mut self, token: &[u8]) {
        self.control.write_all(token).unwrap();
        // Keep consecutive tokens in separate reads
        thread::sleep(Duration::from_millis(20));
    }

    /// Send a query token and return the reply text
    pub fn request(&mut self, token: &[u8]) -> String {
        self.control.write_all(token).unwrap();
        let mut buf = [0u8; 64];
        let n = self.control.read(&mut buf).unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    /// True once the anchor has closed the control connection
    pub fn is_closed(&mut self) -> bool {
        let mut buf = [0u8; 16];
        match self.control.read(&mut buf) {
            Ok(0) => true,
            Ok(_) => false,
            Err(e) => e.kind() == ErrorKind::ConnectionReset,
        }
    }

    /// Reassemble the next frame; an edge marker comes back as an empty frame
    pub fn recv_frame(&self) -> Option<Vec<u8>> {
        self.recv_frame_within(RECV_TIMEOUT)
    }

    pub fn recv_frame_within(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.data.set_read_timeout(Some(timeout)).unwrap();
        let mut frame = Vec::new();
        let mut buf = vec![0u8; 65536];
        loop {
            match self.data.recv_from(&mut buf) {
                Ok((0, _)) => return Some(frame),
                Ok((n, _)) => frame.extend_from_slice(&buf[..n]),
                Err(_) => return None,
            }
        }
    }

    /// Discard frames until none arrives for 200 ms
    pub fn drain(&self) {
        while self.recv_frame_within(Duration::from_millis(200)).is_some() {}
    }

    /// Discard whole frames for roughly `duration`
    pub fn drain_for(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            if self.recv_frame_within(Duration::from_millis(200)).is_none() {
                break;
            }
        }
    }
}
