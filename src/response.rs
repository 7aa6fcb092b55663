use crate::h2::types::Headers;
use bytes::Bytes;

/// Body produced by the application. Chunked bodies are written one DATA
/// frame per chunk followed by an empty terminal DATA frame.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Empty,
    Full(Bytes),
    Chunked(Vec<Bytes>),
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: ResponseBody,
}

impl Response {
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: ResponseBody::Empty,
        }
    }

    #[must_use]
    pub fn full(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: ResponseBody::Full(body.into()),
        }
    }

    #[must_use]
    pub fn chunked(status: u16, chunks: Vec<Bytes>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: ResponseBody::Chunked(chunks),
        }
    }

    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize>(status: u16, value: &T) -> serde_json::Result<Self> {
        Ok(Self {
            status,
            headers: vec![("content-type".to_owned(), "application/json".to_owned())],
            body: ResponseBody::Full(serde_json::to_vec(value)?.into()),
        })
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn header(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_ref())
    }
}
