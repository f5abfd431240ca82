//! Startup and shutdown paths, including the final power action

use crate::harness::{RecordingPower, TestAnchor, anchor_config};
use anchor_io::core::power::PowerAction;
use anchor_io::core::radio::{RadioCollaborator, RadioSettings, RxStream};
use anchor_io::core::types::QuitSignal;
use anchor_io::devices::mock::MockRadio;
use anchor_io::streaming::ServerExit;
use anchor_io::{Error, Result, supervisor};
use std::io::Write;
use std::time::Duration;

/// Radio whose chip synchronization always fails
struct UnsyncableRadio;

impl RadioCollaborator for UnsyncableRadio {
    fn name(&self) -> &str {
        "unsyncable"
    }

    fn configure(&mut self, _settings: &RadioSettings) -> Result<()> {
        Ok(())
    }

    fn synchronize(&mut self) -> Result<()> {
        Err(Error::SynchronizationFailed {
            stage: "multichip",
            status: -5,
        })
    }

    fn create_stream(&mut self, _batch_len: usize) -> Result<Box<dyn RxStream>> {
        panic!("stream must not be created after a failed synchronization");
    }
}

#[test]
fn boot_token_ends_in_reboot() {
    let anchor = TestAnchor::start(anchor_config());
    let mut client = anchor.client();

    client.send(b"data");
    assert!(client.recv_frame().is_some());
    client.control.write_all(b"boot").unwrap();
    assert!(client.is_closed());

    let report = anchor.join();
    assert_eq!(report.exit, ServerExit::Power(PowerAction::Reboot));
    assert_eq!(report.final_action(), PowerAction::Reboot);
    assert!(report.acquisition.is_some());
    let sender = report.sender.expect("sender stats");
    assert!(sender.frames >= 1);
}

#[test]
fn halt_token_ends_in_power_off() {
    let anchor = TestAnchor::start(anchor_config());
    let mut client = anchor.client();

    client.control.write_all(b"halt").unwrap();
    assert!(client.is_closed());

    let report = anchor.join();
    assert_eq!(report.final_action(), PowerAction::PowerOff);
}

#[test]
fn quit_signal_ends_in_reboot() {
    let config = anchor_config();
    let mut radio = MockRadio::new(config.radio.simulation.clone());
    let power = RecordingPower::default();
    let quit = QuitSignal::new();

    let q = quit.clone();
    let raiser = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        q.raise();
    });

    let report = supervisor::run(&config, &mut radio, quit, &power).unwrap();
    raiser.join().unwrap();

    assert_eq!(report.exit, ServerExit::Quit);
    assert_eq!(*power.actions.lock(), vec![PowerAction::Reboot]);
    assert!(radio.is_synchronized());
}

#[test]
fn startup_failure_skips_power_action() {
    let config = anchor_config();
    let power = RecordingPower::default();

    let result = supervisor::run(&config, &mut UnsyncableRadio, QuitSignal::new(), &power);
    assert!(matches!(
        result,
        Err(Error::SynchronizationFailed { status: -5, .. })
    ));
    assert!(power.actions.lock().is_empty());
}

#[test]
fn control_port_in_use_is_startup_failure() {
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = anchor_config();
    config.network.control_address = blocker.local_addr().unwrap().to_string();

    let mut radio = MockRadio::new(config.radio.simulation.clone());
    let power = RecordingPower::default();
    let result = supervisor::run(&config, &mut radio, QuitSignal::new(), &power);

    assert!(result.is_err());
    assert!(power.actions.lock().is_empty());
}

#[test]
fn invalid_detection_channel_is_startup_failure() {
    let mut config = anchor_config();
    config.radio.stream_channels = 8;
    config.detection.channels = vec![7];

    let mut radio = MockRadio::new(config.radio.simulation.clone());
    let power = RecordingPower::default();
    let result = supervisor::run(&config, &mut radio, QuitSignal::new(), &power);

    assert!(matches!(result, Err(Error::Config(_))));
    assert!(power.actions.lock().is_empty());
}
