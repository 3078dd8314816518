use std::fmt;
use std::io;

use thiserror::Error;

use tether_codec::CodecError;
use tether_net::{ParseError, Response};

use crate::auth::GiveUpReason;
use crate::connection::Phase;

/// Flat tag for [`ProtocolError`], for hosts that only branch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    Connect,
    Write,
    Read,
    Parse,
    TruncatedBody,
    Decode,
    AuthGiveUp,
    Cancelled,
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidRequest => "invalid-request",
            ErrorKind::Connect => "connect",
            ErrorKind::Write => "write",
            ErrorKind::Read => "read",
            ErrorKind::Parse => "parse",
            ErrorKind::TruncatedBody => "truncated-body",
            ErrorKind::Decode => "decode",
            ErrorKind::AuthGiveUp => "auth-give-up",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("connect to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("malformed response: {0}")]
    Parse(#[from] ParseError),
    #[error("body truncated after {received} bytes")]
    TruncatedBody { expected: Option<u64>, received: u64 },
    #[error("content decoding failed: {0}")]
    Decode(#[from] CodecError),
    /// The last challenge response is kept so hosts can surface it.
    #[error("authentication abandoned: {reason}")]
    AuthGiveUp {
        reason: GiveUpReason,
        response: Box<Response>,
    },
    #[error("request cancelled")]
    Cancelled,
    #[error("timed out while {phase}")]
    Timeout { phase: Phase },
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ProtocolError::Connect { .. } => ErrorKind::Connect,
            ProtocolError::Write(_) => ErrorKind::Write,
            ProtocolError::Read(_) => ErrorKind::Read,
            ProtocolError::Parse(_) => ErrorKind::Parse,
            ProtocolError::TruncatedBody { .. } => ErrorKind::TruncatedBody,
            ProtocolError::Decode(_) => ErrorKind::Decode,
            ProtocolError::AuthGiveUp { .. } => ErrorKind::AuthGiveUp,
            ProtocolError::Cancelled => ErrorKind::Cancelled,
            ProtocolError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
