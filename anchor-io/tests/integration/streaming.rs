//! Data channel behaviour: counted and continuous streaming, framing

use crate::harness::{TestAnchor, anchor_config};
use std::time::Duration;

#[test]
fn counted_request_delivers_exactly_n_frames() {
    let anchor = TestAnchor::start(anchor_config());
    let mut client = anchor.client();

    client.send(b"3");
    for _ in 0..3 {
        let frame = client.recv_frame().expect("frame");
        assert_eq!(frame.len(), anchor.batch_bytes);
    }
    assert!(client.recv_frame_within(Duration::from_millis(300)).is_none());

    drop(client);
    anchor.stop();
}

#[test]
fn four_digit_count() {
    let anchor = TestAnchor::start(anchor_config());
    let mut client = anchor.client();

    client.send(b"0005");
    let frames = std::iter::from_fn(|| client.recv_frame_within(Duration::from_millis(500)))
        .take(10)
        .count();
    assert_eq!(frames, 5);

    drop(client);
    anchor.stop();
}

#[test]
fn continuous_stream_until_stop() {
    let anchor = TestAnchor::start(anchor_config());
    let mut client = anchor.client();

    client.send(b"data");
    for _ in 0..10 {
        let frame = client.recv_frame().expect("frame");
        assert_eq!(frame.len(), anchor.batch_bytes);
    }

    client.send(b"stop");
    client.drain();
    assert!(client.recv_frame_within(Duration::from_millis(300)).is_none());

    drop(client);
    anchor.stop();
}

#[test]
fn directive_outlives_control_connection() {
    let anchor = TestAnchor::start(anchor_config());
    let mut client = anchor.client();

    client.send(b"data");
    assert!(client.recv_frame().is_some());

    // Close only the control side; the data socket keeps listening
    client
        .control
        .shutdown(std::net::Shutdown::Both)
        .unwrap();
    client.drain_for(Duration::from_millis(100));
    assert!(client.recv_frame().is_some());

    anchor.stop();
}

#[test]
fn large_batches_are_fragmented_and_reassembled() {
    let mut config = anchor_config();
    // 8192 rows x 8 channels x 2 bytes = 131072 bytes: two full datagrams + 58 bytes
    config.radio.buffer_len = 8192;
    config.radio.sample_rate = 163_840;
    let anchor = TestAnchor::start(config);
    let mut client = anchor.client();

    client.send(b"2");
    for _ in 0..2 {
        let frame = client.recv_frame().expect("frame");
        assert_eq!(frame.len(), 131_072);
    }

    drop(client);
    anchor.stop();
}

#[test]
fn edge_markers_follow_bursts_while_streaming_continuously() {
    let mut config = anchor_config();
    config.radio.simulation.activity_pattern = vec![true, true, false, false];
    let anchor = TestAnchor::start(config);
    let mut client = anchor.client();

    client.send(b"data");
    client.drain_for(Duration::from_millis(50));

    let sizes: Vec<usize> = (0..12)
        .map(|_| client.recv_frame().expect("frame").len())
        .collect();
    // Every burst of full frames is followed by exactly one empty marker
    for pair in sizes.windows(2) {
        if pair[0] == 0 {
            assert_eq!(pair[1], anchor.batch_bytes);
        }
    }
    assert!(sizes.contains(&0));
    assert!(sizes.iter().all(|&s| s == 0 || s == anchor.batch_bytes));

    drop(client);
    anchor.stop();
}

#[test]
fn counted_stream_has_no_edge_markers() {
    let mut config = anchor_config();
    config.radio.simulation.activity_pattern = vec![true, false];
    let anchor = TestAnchor::start(config);
    let mut client = anchor.client();

    client.send(b"4");
    for _ in 0..4 {
        assert_eq!(client.recv_frame().expect("frame").len(), anchor.batch_bytes);
    }
    assert!(client.recv_frame_within(Duration::from_millis(300)).is_none());

    drop(client);
    anchor.stop();
}

#[test]
fn inactive_signal_sends_nothing() {
    let mut config = anchor_config();
    config.radio.simulation.activity_pattern = vec![false];
    let anchor = TestAnchor::start(config);
    let mut client = anchor.client();

    client.send(b"data");
    assert!(client.recv_frame_within(Duration::from_millis(300)).is_none());

    drop(client);
    let report = anchor.stop();
    let acquisition = report.acquisition.expect("acquisition stats");
    assert!(acquisition.iterations > 0);
    assert_eq!(acquisition.active, 0);
}
