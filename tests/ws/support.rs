//! Shared fixtures: client-side frame builders and a recording handler.

use trellis::ws::{
    frame::WsFrame, CloseEvent, Outcome, WsError, WsHandler,
};

pub const CONTINUATION: u8 = 0x0;
pub const TEXT: u8 = 0x1;
pub const BINARY: u8 = 0x2;
pub const CLOSE: u8 = 0x8;
pub const PING: u8 = 0x9;
pub const PONG: u8 = 0xa;

/// Serializes an unmasked frame as raw bytes.
pub fn frame(opcode: u8, fin: bool, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![if fin { 0x80 } else { 0 } | opcode];
    if payload.len() <= 125 {
        bytes.push(payload.len() as u8);
    } else {
        bytes.push(126);
        bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    }
    bytes.extend_from_slice(payload);
    bytes
}

/// Serializes a masked frame, as a conforming client would send it.
pub fn masked_frame(opcode: u8, fin: bool, payload: &[u8], key: [u8; 4]) -> Vec<u8> {
    let mut bytes = vec![if fin { 0x80 } else { 0 } | opcode];
    assert!(payload.len() <= 125, "extend the builder for longer payloads");
    bytes.push(0x80 | payload.len() as u8);
    bytes.extend_from_slice(&key);
    bytes.extend(
        payload
            .iter()
            .enumerate()
            .map(|(i, byte)| byte ^ key[i % 4]),
    );
    bytes
}

pub fn close_with_code(code: u16) -> Vec<u8> {
    frame(CLOSE, true, &code.to_be_bytes())
}

/// Re-parses the server's output buffer into frames; panics on leftovers.
pub fn parse_server_frames(mut bytes: &[u8]) -> Vec<WsFrame> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let (frame, consumed) = WsFrame::parse(bytes)
            .expect("server emitted an invalid frame")
            .expect("trailing partial frame in output");
        frames.push(frame);
        bytes = &bytes[consumed..];
    }
    frames
}

/// Pulls the close code out of what must be the final output frame.
pub fn last_close_code(output: &[u8]) -> Option<u16> {
    match parse_server_frames(output).pop() {
        Some(WsFrame::Close { code, .. }) => code,
        other => panic!("expected a close frame, got {other:?}"),
    }
}

/// Records every callback in order so tests can assert on dispatch.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<String>,
}

impl WsHandler for Recorder {
    type Message = String;

    fn handle_text(&mut self, text: &str) -> Outcome {
        self.events.push(format!("text:{text}"));
        Outcome::Continue
    }

    fn handle_binary(&mut self, data: &[u8]) -> Outcome {
        self.events.push(format!("binary:{}", data.len()));
        Outcome::Continue
    }

    fn handle_ping(&mut self, data: &[u8]) -> Outcome {
        self.events
            .push(format!("ping:{}", String::from_utf8_lossy(data)));
        Outcome::Continue
    }

    fn handle_pong(&mut self, data: &[u8]) -> Outcome {
        self.events
            .push(format!("pong:{}", String::from_utf8_lossy(data)));
        Outcome::Continue
    }

    fn handle_close(&mut self, close: CloseEvent) {
        self.events
            .push(format!("close:{:?}:{}", close.initiator, close.code));
    }

    fn handle_error(&mut self, error: &WsError) {
        self.events.push(format!("error:{}", error.close_code()));
    }

    fn handle_timeout(&mut self) {
        self.events.push("timeout".to_owned());
    }

    fn handle_info(&mut self, message: String) -> Outcome {
        self.events.push(format!("info:{message}"));
        Outcome::Continue
    }
}
