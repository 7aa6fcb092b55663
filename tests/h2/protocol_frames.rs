//! Connection-level frames: SETTINGS, PING, GOAWAY, and unknown types.

use crate::support::*;
use trellis::h2::connection::{Connection, Event};

fn established() -> Connection {
    let mut connection = Connection::new();
    connection.take_output();
    connection.recv(PREFACE).unwrap();
    connection
}

#[test]
fn settings_are_acknowledged() {
    let mut connection = established();
    let settings = raw_frame(0x4, 0, 0, &[0, 4, 0, 1, 0, 0]);
    connection.recv(&settings).unwrap();
    assert_eq!(&connection.take_output()[..], SETTINGS_ACK);
}

#[test]
fn settings_ack_clears_the_in_flight_marker() {
    let mut connection = established();
    assert!(connection.settings_in_flight());
    connection.recv(&SETTINGS_ACK).unwrap();
    assert!(!connection.settings_in_flight());
    assert!(connection.take_output().is_empty());
}

#[test]
fn settings_on_nonzero_stream_is_a_protocol_error() {
    let mut connection = established();
    connection.recv(&raw_frame(0x4, 0, 1, &[])).unwrap_err();
    assert_eq!(
        &connection.take_output()[..],
        [0, 0, 8, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]
    );
    assert!(connection.is_closing());
}

#[test]
fn ping_is_echoed_with_the_ack_flag() {
    let mut connection = established();
    let payload = [0xde, 0xad, 0xbe, 0xef, 0xca, 0xfe, 0xba, 0xbe];
    connection.recv(&raw_frame(0x6, 0, 0, &payload)).unwrap();
    assert_eq!(&connection.take_output()[..], raw_frame(0x6, 1, 0, &payload));
}

#[test]
fn ping_ack_is_not_answered() {
    let mut connection = established();
    connection
        .recv(&raw_frame(0x6, 1, 0, &[1, 2, 3, 4, 5, 6, 7, 8]))
        .unwrap();
    assert!(connection.take_output().is_empty());
}

#[test]
fn ping_with_wrong_payload_size_is_a_frame_size_error() {
    let mut connection = established();
    connection.recv(&raw_frame(0x6, 0, 0, &[1, 2, 3, 4])).unwrap_err();
    let frames = parse_all(&connection.take_output());
    match &frames[..] {
        [trellis::h2::frame::Frame::GoAway { error, .. }] => {
            assert_eq!(*error, trellis::h2::types::ErrorType::FrameSizeError);
        }
        other => panic!("unexpected output {other:?}"),
    }
}

#[test]
fn client_goaway_is_echoed_and_the_connection_closes() {
    let mut connection = established();
    let goaway = goaway_frame(0, 0);
    let events = connection.recv(&goaway).unwrap();
    assert!(matches!(events[..], [Event::GoawayReceived { .. }]));
    assert_eq!(&connection.take_output()[..], goaway);
    assert!(connection.is_closing());
}

#[test]
fn unknown_frame_types_are_ignored() {
    let mut connection = established();
    let events = connection
        .recv(&raw_frame(0xab, 0x7, 9, &[1, 2, 3]))
        .unwrap();
    assert!(events.is_empty());
    assert!(connection.take_output().is_empty());
    assert!(!connection.is_closing());

    // the connection is still fully alive afterwards
    connection
        .recv(&raw_frame(0x6, 0, 0, &[0; 8]))
        .unwrap();
    assert_eq!(&connection.take_output()[..], raw_frame(0x6, 1, 0, &[0; 8]));
}

#[test]
fn oversized_frame_is_a_frame_size_error() {
    let mut connection = established();
    // header announces a 1 MiB DATA payload; rejected before buffering it
    let header = [0x10, 0, 0, 0x0, 0, 0, 0, 0, 1];
    connection.recv(&header).unwrap_err();
    let frames = parse_all(&connection.take_output());
    match &frames[..] {
        [trellis::h2::frame::Frame::GoAway { error, .. }] => {
            assert_eq!(*error, trellis::h2::types::ErrorType::FrameSizeError);
        }
        other => panic!("unexpected output {other:?}"),
    }
}
