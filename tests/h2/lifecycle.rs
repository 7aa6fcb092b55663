//! Connection establishment: preface handling and the initial SETTINGS
//! exchange, under both dribbled and coalesced delivery.

use crate::support::*;
use trellis::h2::connection::{Connection, ConnectionError};

const PING: [u8; 17] = [0, 0, 8, 6, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8];
const PING_ACK: [u8; 17] = [0, 0, 8, 6, 1, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8];

fn session_input() -> Vec<u8> {
    let mut input = PREFACE.to_vec();
    input.extend_from_slice(&SERVER_SETTINGS); // client's empty SETTINGS is byte-identical
    input.extend_from_slice(&PING);
    input
}

fn expected_output() -> Vec<u8> {
    let mut expected = SERVER_SETTINGS.to_vec();
    expected.extend_from_slice(&SETTINGS_ACK);
    expected.extend_from_slice(&PING_ACK);
    expected
}

#[test]
fn initial_settings_queued_before_any_input() {
    let mut connection = Connection::new();
    assert_eq!(&connection.take_output()[..], SERVER_SETTINGS);
}

#[test]
fn preface_settings_ping_delivered_byte_by_byte() {
    let mut connection = Connection::new();
    let mut output = connection.take_output().to_vec();
    for byte in session_input() {
        let events = connection.recv(&[byte]).unwrap();
        assert!(events.is_empty());
        output.extend_from_slice(&connection.take_output());
    }
    assert_eq!(output, expected_output());
    assert!(!connection.is_closing());
}

#[test]
fn preface_settings_ping_delivered_in_one_write() {
    let mut connection = Connection::new();
    let mut output = connection.take_output().to_vec();
    connection.recv(&session_input()).unwrap();
    output.extend_from_slice(&connection.take_output());
    assert_eq!(output, expected_output());
}

#[test]
fn chunking_never_changes_the_output() {
    // split the same session at every possible point; the output bytes
    // must not depend on where the transport read boundary fell
    let input = session_input();
    let expected = expected_output();
    for split in 1..input.len() {
        let mut connection = Connection::new();
        let mut output = connection.take_output().to_vec();
        connection.recv(&input[..split]).unwrap();
        output.extend_from_slice(&connection.take_output());
        connection.recv(&input[split..]).unwrap();
        output.extend_from_slice(&connection.take_output());
        assert_eq!(output, expected, "split at {split}");
    }
}

#[test]
fn bad_preface_closes_without_goaway() {
    let mut connection = Connection::new();
    connection.take_output();
    let err = connection
        .recv(b"GET / HTTP/1.1\r\nHost: ex\r\n\r\n")
        .unwrap_err();
    assert!(matches!(err, ConnectionError::BadPreface));
    assert!(connection.is_closing());
    assert!(connection.take_output().is_empty());
}

#[test]
fn partial_preface_keeps_waiting() {
    let mut connection = Connection::new();
    assert!(connection.recv(&PREFACE[..10]).unwrap().is_empty());
    assert!(!connection.is_closing());
    assert!(connection.recv(&PREFACE[10..]).unwrap().is_empty());
    assert!(!connection.is_closing());
}
