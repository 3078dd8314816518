use thiserror::Error;

use super::headers::Headers;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
    pub raw_name: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let raw_name = name.into();
        Self {
            name: raw_name.trim().to_string(),
            value: value.into(),
            raw_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: HttpVersion,
    pub status_code: u16,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
    Other(String),
}

impl HttpVersion {
    pub fn as_str(&self) -> &str {
        match self {
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
            HttpVersion::Other(raw) => raw,
        }
    }
}

/// Status line and headers of a response, as produced by the head parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub line: StatusLine,
    pub headers: Headers,
}

impl ResponseHead {
    pub fn status_code(&self) -> u16 {
        self.line.status_code
    }

    /// 1xx responses other than 101 are interim and followed by the real response.
    pub fn is_interim(&self) -> bool {
        self.line.status_code / 100 == 1 && self.line.status_code != 101
    }
}

/// A fully received response. `body` holds the bytes as framed on the wire (after
/// de-chunking); `decoded_body` is set once a content coding has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub line: StatusLine,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub decoded_body: Option<Vec<u8>>,
    pub trailers: Headers,
}

impl Response {
    pub fn from_parts(head: ResponseHead, body: Vec<u8>, trailers: Headers) -> Self {
        Self {
            line: head.line,
            headers: head.headers,
            body,
            decoded_body: None,
            trailers,
        }
    }

    pub fn status(&self) -> u16 {
        self.line.status_code
    }

    pub fn reason(&self) -> &str {
        &self.line.reason
    }

    /// 401 and 407 ask the client to authenticate.
    pub fn is_challenge(&self) -> bool {
        matches!(self.line.status_code, 401 | 407)
    }

    /// The body with any content coding removed.
    pub fn decoded(&self) -> &[u8] {
        self.decoded_body.as_deref().unwrap_or(&self.body)
    }

    pub fn head(&self) -> ResponseHead {
        ResponseHead {
            line: self.line.clone(),
            headers: self.headers.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at byte {offset}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("invalid status line")]
    InvalidStatusLine,
    #[error("invalid header line")]
    InvalidHeader,
    #[error("header block too large")]
    HeaderTooLarge,
    #[error("body too large")]
    BodyTooLarge,
    #[error("invalid content-length")]
    InvalidContentLength,
    #[error("invalid chunk size")]
    InvalidChunkSize,
    #[error("invalid chunk terminator")]
    InvalidChunkTerminator,
    #[error("unexpected end of stream")]
    UnexpectedEof,
}

/// A request that cannot be written to the wire as given.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),
    #[error("invalid value for header {0:?}")]
    InvalidHeaderValue(String),
}
