//! Data and control frame dispatch through the handler.

use crate::support::*;
use trellis::ws::{
    frame::WsFrame, Negotiation, Outcome, WsConnection, WsHandler, WsOptions,
};

fn open() -> WsConnection<Recorder> {
    // unwrap: the default negotiation accepts
    WsConnection::negotiate(Recorder::default()).map_err(|_| ()).unwrap()
}

#[test]
fn text_is_dispatched() {
    let mut connection = open();
    connection.recv(&frame(TEXT, true, b"hello")).unwrap();
    assert_eq!(connection.handler().events, ["text:hello"]);
    assert!(connection.take_output().is_empty());
    assert!(!connection.is_closing());
}

#[test]
fn masked_client_frames_are_unmasked() {
    let mut connection = open();
    connection
        .recv(&masked_frame(TEXT, true, b"hello", [0x11, 0x22, 0x33, 0x44]))
        .unwrap();
    assert_eq!(connection.handler().events, ["text:hello"]);
}

#[test]
fn binary_is_dispatched() {
    let mut connection = open();
    connection.recv(&frame(BINARY, true, &[1, 2, 3])).unwrap();
    assert_eq!(connection.handler().events, ["binary:3"]);
}

#[test]
fn fragmented_text_is_reassembled() {
    let mut connection = open();
    connection.recv(&frame(TEXT, false, b"He")).unwrap();
    assert!(connection.handler().events.is_empty());
    connection.recv(&frame(CONTINUATION, false, b"ll")).unwrap();
    connection.recv(&frame(CONTINUATION, true, b"o")).unwrap();
    assert_eq!(connection.handler().events, ["text:Hello"]);
}

#[test]
fn fragmented_binary_is_reassembled() {
    let mut connection = open();
    connection.recv(&frame(BINARY, false, &[1, 2])).unwrap();
    connection.recv(&frame(CONTINUATION, true, &[3, 4, 5])).unwrap();
    assert_eq!(connection.handler().events, ["binary:5"]);
}

#[test]
fn control_frames_may_interleave_a_fragmented_message() {
    let mut connection = open();
    connection.recv(&frame(TEXT, false, b"He")).unwrap();
    connection.recv(&frame(PING, true, b"hb")).unwrap();
    connection.recv(&frame(CONTINUATION, true, b"llo")).unwrap();
    assert_eq!(connection.handler().events, ["ping:hb", "text:Hello"]);
    // the pong went out while the message was still buffering
    assert_eq!(
        parse_server_frames(&connection.take_output()),
        vec![WsFrame::Pong {
            data: trellis::Bytes::from_static(b"hb"),
        }]
    );
}

#[test]
fn ping_is_answered_with_a_pong() {
    let mut connection = open();
    connection.recv(&frame(PING, true, b"marco")).unwrap();
    assert_eq!(connection.handler().events, ["ping:marco"]);
    assert_eq!(
        parse_server_frames(&connection.take_output()),
        vec![WsFrame::Pong {
            data: trellis::Bytes::from_static(b"marco"),
        }]
    );
}

#[test]
fn pong_is_dispatched_without_a_reply() {
    let mut connection = open();
    connection.recv(&frame(PONG, true, b"polo")).unwrap();
    assert_eq!(connection.handler().events, ["pong:polo"]);
    assert!(connection.take_output().is_empty());
}

#[test]
fn info_messages_reach_the_handler() {
    let mut connection = open();
    connection.info("tick".to_owned()).unwrap();
    assert_eq!(connection.handler().events, ["info:tick"]);
}

#[test]
fn frames_split_across_reads_parse_identically() {
    let input = frame(TEXT, true, b"hello");
    for split in 1..input.len() {
        let mut connection = open();
        connection.recv(&input[..split]).unwrap();
        connection.recv(&input[split..]).unwrap();
        assert_eq!(connection.handler().events, ["text:hello"], "split at {split}");
    }
}

struct Refuser;

impl WsHandler for Refuser {
    type Message = ();

    fn negotiate(&mut self) -> Negotiation {
        Negotiation::Refuse
    }
}

#[test]
fn refused_negotiation_returns_the_handler() {
    assert!(WsConnection::negotiate(Refuser).is_err());
}

struct CloseOnText;

impl WsHandler for CloseOnText {
    type Message = ();

    fn handle_text(&mut self, _text: &str) -> Outcome {
        Outcome::Close
    }
}

#[test]
fn close_outcome_sends_a_normal_close() {
    let mut connection = WsConnection::negotiate(CloseOnText).map_err(|_| ()).unwrap();
    connection.recv(&frame(TEXT, true, b"bye")).unwrap();
    assert_eq!(last_close_code(&connection.take_output()), Some(1000));
    assert!(connection.is_closing());
}

struct ErrorOnText;

impl WsHandler for ErrorOnText {
    type Message = ();

    fn handle_text(&mut self, _text: &str) -> Outcome {
        Outcome::Error(anyhow::anyhow!("kaboom"))
    }
}

#[test]
fn error_outcome_sends_1011() {
    let mut connection = WsConnection::negotiate(ErrorOnText).map_err(|_| ()).unwrap();
    connection.recv(&frame(TEXT, true, b"boom")).unwrap_err();
    assert_eq!(last_close_code(&connection.take_output()), Some(1011));
}

struct SmallFrames;

impl WsHandler for SmallFrames {
    type Message = ();

    fn negotiate(&mut self) -> Negotiation {
        Negotiation::Accept(WsOptions {
            max_frame_size: Some(4),
            ..WsOptions::default()
        })
    }
}

#[test]
fn oversized_payload_closes_with_1009() {
    let mut connection = WsConnection::negotiate(SmallFrames).map_err(|_| ()).unwrap();
    connection.recv(&frame(BINARY, true, &[0; 5])).unwrap_err();
    assert_eq!(last_close_code(&connection.take_output()), Some(1009));
}

#[test]
fn oversized_reassembled_message_closes_with_1009() {
    let mut connection = WsConnection::negotiate(SmallFrames).map_err(|_| ()).unwrap();
    connection.recv(&frame(BINARY, false, &[0; 3])).unwrap();
    connection.recv(&frame(CONTINUATION, true, &[0; 3])).unwrap_err();
    assert_eq!(last_close_code(&connection.take_output()), Some(1009));
}
