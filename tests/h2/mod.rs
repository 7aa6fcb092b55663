mod lifecycle;
mod protocol_frames;
mod support;
