use crate::h2::{stream::Stream, types::*};
use std::collections::HashMap;

/// A client stream identifier that can never be accepted. All of these are
/// connection-level protocol errors.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum StreamIdError {
    #[error("stream 0 cannot open a stream")]
    Zero,
    #[error("even stream ID {0} is reserved for the server")]
    Even(StreamId),
    #[error("stream ID {0} does not exceed the last accepted ID {1}")]
    NotIncreasing(StreamId, StreamId),
}

/// Owns every stream of one connection and enforces the identifier rules:
/// client streams are odd and strictly increasing. The largest accepted ID
/// is what a GOAWAY reports as `last_stream_id`.
#[derive(Debug, Default)]
pub struct StreamCoordinator {
    streams: HashMap<NonZeroStreamId, Stream>,
    last_stream_id: StreamId,
}

impl StreamCoordinator {
    /// Validates a fresh client stream ID and creates its stream. An invalid
    /// ID is never recorded; `last_stream_id` keeps its previous value.
    pub fn create(&mut self, id: StreamId) -> Result<&mut Stream, StreamIdError> {
        let id = match NonZeroStreamId::new(id) {
            Some(id) => id,
            None => return Err(StreamIdError::Zero),
        };
        if id.get() % 2 == 0 {
            return Err(StreamIdError::Even(id.get()));
        }
        if id.get() <= self.last_stream_id {
            return Err(StreamIdError::NotIncreasing(id.get(), self.last_stream_id));
        }
        self.last_stream_id = id.get();
        Ok(self.streams.entry(id).or_insert_with(|| Stream::new(id)))
    }

    #[must_use]
    pub fn get_mut(&mut self, id: StreamId) -> Option<&mut Stream> {
        NonZeroStreamId::new(id).and_then(|id| self.streams.get_mut(&id))
    }

    pub fn remove(&mut self, id: StreamId) {
        if let Some(id) = NonZeroStreamId::new(id) {
            self.streams.remove(&id);
        }
    }

    /// Highest client stream ID accepted so far, 0 before the first stream.
    #[must_use]
    pub fn last_stream_id(&self) -> StreamId {
        self.last_stream_id
    }
}
