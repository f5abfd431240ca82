//! Process orchestration for the anchor daemon
//!
//! Startup runs strictly in order and any failure aborts before a thread is
//! spawned:
//!
//! ```text
//! validate config → configure radio → synchronize chips → create RX stream
//!   → bind data socket → bind control listener
//!   → spawn "acquisition" + "stream-sender" → serve control channel
//! ```
//!
//! The command server runs on the calling thread. When it returns (power
//! command or quit) the supervisor raises quit, waits for acquisition to
//! finish its current refill, lets the sender drain the queue, and finally
//! asks the OS to power off (`halt`) or reboot (every other exit).

use crate::acquisition::{AcquisitionLoop, AcquisitionStats, ActivityDetector, BufferAcquirer};
use crate::config::AppConfig;
use crate::core::directive::DirectiveCell;
use crate::core::power::{PowerAction, PowerControl};
use crate::core::radio::{RadioCollaborator, RadioSettings};
use crate::core::types::QuitSignal;
use crate::error::{Error, Result};
use crate::streaming::{CommandServer, SenderStats, ServerExit, StreamSender, frame_queue};
use log::{error, info};
use std::net::{SocketAddr, UdpSocket};
use std::thread::{self, JoinHandle};

/// Raises quit when dropped, including during a panic unwind
struct QuitOnExit(QuitSignal);

impl Drop for QuitOnExit {
    fn drop(&mut self) {
        self.0.raise();
    }
}

/// How the daemon ended
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub exit: ServerExit,
    /// `None` if the acquisition unit failed or panicked
    pub acquisition: Option<AcquisitionStats>,
    /// `None` if the stream sender panicked
    pub sender: Option<SenderStats>,
}

impl ShutdownReport {
    /// Power action to take once everything has stopped
    pub fn final_action(&self) -> PowerAction {
        match self.exit {
            ServerExit::Power(PowerAction::PowerOff) => PowerAction::PowerOff,
            _ => PowerAction::Reboot,
        }
    }
}

/// A started anchor: worker threads running, control channel bound
pub struct Anchor {
    server: CommandServer,
    data_addr: SocketAddr,
    directive: DirectiveCell,
    quit: QuitSignal,
    acquisition: JoinHandle<Result<AcquisitionStats>>,
    sender: JoinHandle<SenderStats>,
}

impl Anchor {
    /// Run the startup sequence and spawn the worker threads
    pub fn start(
        config: &AppConfig,
        radio: &mut dyn RadioCollaborator,
        quit: QuitSignal,
    ) -> Result<Self> {
        config.validate()?;
        info!("Starting anchor on {} radio", radio.name());

        let settings = RadioSettings::from(&config.radio);
        radio.configure(&settings)?;
        info!("Radio configured");

        radio.synchronize()?;
        info!("Radio chips synchronized");

        let stream = radio.create_stream(config.radio.buffer_len)?;
        info!(
            "RX stream created: {} rows x {} channels ({} bytes per batch)",
            config.radio.buffer_len,
            config.radio.stream_channels,
            config.radio.batch_bytes()
        );

        let data_socket = UdpSocket::bind(&config.network.data_address).map_err(|e| {
            Error::Other(format!(
                "Failed to bind data socket {}: {}",
                config.network.data_address, e
            ))
        })?;
        let data_addr = data_socket.local_addr()?;
        info!("Data socket bound on {}", data_addr);

        let directive = DirectiveCell::new();
        let server = CommandServer::bind(config, directive.clone(), quit.clone())?;

        let (producer, consumer) = frame_queue(&config.queue);

        let detector = ActivityDetector::new(&config.detection, config.radio.stream_channels);
        let acquirer = BufferAcquirer::new(stream, detector, config.radio.batch_bytes());
        let acquisition_loop = AcquisitionLoop::new(
            acquirer,
            producer,
            quit.clone(),
            config.acquisition.idle_backoff(),
            config.acquisition.stats_interval,
        );

        let guard = QuitOnExit(quit.clone());
        let acquisition = thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || {
                let _guard = guard;
                let result = acquisition_loop.run();
                if let Err(ref e) = result {
                    error!("Acquisition stopped: {}", e);
                }
                result
            })?;

        let sender = StreamSender::new(data_socket, directive.clone(), config.network.edge_markers);
        let sender = match thread::Builder::new()
            .name("stream-sender".to_string())
            .spawn(move || sender.run(consumer))
        {
            Ok(handle) => handle,
            Err(e) => {
                quit.raise();
                let _ = acquisition.join();
                return Err(e.into());
            }
        };

        info!("Anchor running");
        Ok(Self {
            server,
            data_addr,
            directive,
            quit,
            acquisition,
            sender,
        })
    }

    pub fn control_addr(&self) -> Result<SocketAddr> {
        self.server.local_addr()
    }

    pub fn data_addr(&self) -> SocketAddr {
        self.data_addr
    }

    pub fn directive(&self) -> &DirectiveCell {
        &self.directive
    }

    /// Serve the control channel, then stop every unit
    pub fn run(self) -> ShutdownReport {
        let exit = self.server.run();
        info!("Command server exited: {:?}", exit);

        self.quit.raise();
        info!("Waiting for acquisition to finish its current refill...");
        let acquisition = match self.acquisition.join() {
            Ok(Ok(stats)) => Some(stats),
            Ok(Err(_)) => None,
            Err(_) => {
                error!("Acquisition thread panicked");
                None
            }
        };

        let sender = match self.sender.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                error!("Stream sender thread panicked");
                None
            }
        };

        info!("All units stopped");
        ShutdownReport {
            exit,
            acquisition,
            sender,
        }
    }
}

/// Start the anchor, serve until exit, then apply the power action
///
/// Startup failures return `Err` without touching power state. Once running,
/// every exit path ends in a power action.
pub fn run(
    config: &AppConfig,
    radio: &mut dyn RadioCollaborator,
    quit: QuitSignal,
    power: &dyn PowerControl,
) -> Result<ShutdownReport> {
    let anchor = Anchor::start(config, radio, quit)?;
    let report = anchor.run();

    let action = report.final_action();
    info!("Shutdown complete, requesting {:?}", action);
    power.apply(action);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_action() {
        let report = |exit| ShutdownReport {
            exit,
            acquisition: None,
            sender: None,
        };
        assert_eq!(
            report(ServerExit::Power(PowerAction::PowerOff)).final_action(),
            PowerAction::PowerOff
        );
        assert_eq!(
            report(ServerExit::Power(PowerAction::Reboot)).final_action(),
            PowerAction::Reboot
        );
        assert_eq!(report(ServerExit::Quit).final_action(), PowerAction::Reboot);
    }

    #[test]
    fn test_quit_guard_raises_on_panic() {
        let quit = QuitSignal::new();
        let guard = QuitOnExit(quit.clone());
        let handle = thread::spawn(move || {
            let _guard = guard;
            panic!("unit failure");
        });
        assert!(handle.join().is_err());
        assert!(quit.is_raised());
    }
}
