//! Control channel behaviour over a real TCP connection

use crate::harness::{ROWS, TestAnchor, anchor_config};
use anchor_io::core::directive::{Remaining, StreamDirective};
use std::io::Write;
use std::net::SocketAddr;

#[test]
fn ping_and_queries_reply_without_terminator() {
    let anchor = TestAnchor::start(anchor_config());
    let mut client = anchor.client();

    assert_eq!(client.request(b"ping"), "ping");
    assert_eq!(client.request(b"blen"), ROWS.to_string());
    assert_eq!(client.request(b"rate"), "256000");

    drop(client);
    anchor.stop();
}

#[test]
fn unknown_token_closes_connection_only() {
    let mut config = anchor_config();
    // Nothing active, so the count is never consumed
    config.radio.simulation.activity_pattern = vec![false];
    let anchor = TestAnchor::start(config);

    let mut client = anchor.client();
    let peer = client.control.local_addr().unwrap();
    let expected = StreamDirective::new(
        SocketAddr::new(peer.ip(), peer.port() + 1000),
        Remaining::Count(3),
    );
    client.send(b"0003");
    assert!(anchor.wait_for_directive(expected));

    client.control.write_all(b"xyzw").unwrap();
    assert!(client.is_closed());
    drop(client);
    assert_eq!(anchor.directive.snapshot(), expected);

    // The server keeps accepting and answering queries
    let mut client = anchor.client();
    assert_eq!(client.request(b"blen"), ROWS.to_string());
    assert_eq!(client.request(b"rate"), "256000");
    assert_eq!(anchor.directive.snapshot(), expected);

    drop(client);
    anchor.stop();
}

#[test]
fn short_non_digit_token_closes_connection() {
    let anchor = TestAnchor::start(anchor_config());
    let mut client = anchor.client();

    client.control.write_all(b"pi").unwrap();
    assert!(client.is_closed());

    drop(client);
    anchor.stop();
}

#[test]
fn queries_do_not_start_streaming() {
    let anchor = TestAnchor::start(anchor_config());
    let mut client = anchor.client();

    client.request(b"ping");
    client.request(b"blen");
    assert!(
        client
            .recv_frame_within(std::time::Duration::from_millis(300))
            .is_none()
    );

    drop(client);
    anchor.stop();
}

#[test]
fn halt_can_be_disabled() {
    let mut config = anchor_config();
    config.power.allow_halt = false;
    let anchor = TestAnchor::start(config);

    let mut client = anchor.client();
    client.control.write_all(b"halt").unwrap();
    assert!(client.is_closed());
    drop(client);

    // Still serving
    let mut client = anchor.client();
    assert_eq!(client.request(b"ping"), "ping");
    drop(client);

    let report = anchor.stop();
    assert_eq!(report.final_action(), anchor_io::core::power::PowerAction::Reboot);
}
