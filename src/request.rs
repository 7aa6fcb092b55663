use crate::h2::types::Headers;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum Method {
    #[display(fmt = "GET")]
    Get,
    #[display(fmt = "POST")]
    Post,
    #[display(fmt = "PUT")]
    Put,
    #[display(fmt = "DELETE")]
    Delete,
    #[display(fmt = "HEAD")]
    Head,
    #[display(fmt = "PATCH")]
    Patch,
    #[display(fmt = "OPTIONS")]
    Options,
    #[display(fmt = "{}", _0)]
    Other(String),
}

impl From<&str> for Method {
    fn from(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "PATCH" => Self::Patch,
            "OPTIONS" => Self::Options,
            other => Self::Other(other.to_owned()),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error("missing required pseudo-header {0}")]
    MissingPseudoHeader(&'static str),
    #[error("pseudo-header {0} after a regular header")]
    MisplacedPseudoHeader(String),
}

/// A complete request as assembled from one stream's header block and body.
///
/// https://httpwg.org/specs/rfc7540.html#HttpRequest
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub scheme: String,
    pub authority: Option<String>,
    pub path: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl Request {
    /// Splits a decoded header list into pseudo-headers and regular headers.
    /// Pseudo-headers must all precede the regular ones (RFC 7540 section
    /// 8.1.2.1); `:method`, `:scheme` and `:path` are required.
    pub fn from_header_list(list: Headers, body: Bytes) -> Result<Self, RequestError> {
        let mut method = None;
        let mut scheme = None;
        let mut authority = None;
        let mut path = None;
        let mut headers = Headers::with_capacity(list.len());

        for (key, value) in list {
            if let Some(name) = key.strip_prefix(':') {
                if !headers.is_empty() {
                    return Err(RequestError::MisplacedPseudoHeader(key.clone()));
                }
                match name {
                    "method" => method = Some(Method::from(value.as_str())),
                    "scheme" => scheme = Some(value),
                    "authority" => authority = Some(value),
                    "path" => path = Some(value),
                    _ => {}
                }
            } else {
                headers.push((key, value));
            }
        }

        Ok(Self {
            method: method.ok_or(RequestError::MissingPseudoHeader(":method"))?,
            scheme: scheme.ok_or(RequestError::MissingPseudoHeader(":scheme"))?,
            authority,
            path: path.ok_or(RequestError::MissingPseudoHeader(":path"))?,
            headers,
            body,
        })
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
