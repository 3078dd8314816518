use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use tether_net::{
    BodyDecoder, BodyFraming, HeadStatus, Headers, ParseError, ParseErrorKind, Request, Response,
    ResponseHead, parse_response_head, serialize_request,
};

use crate::config::ProtocolConfig;
use crate::connector::{BoxedTransport, Connector, Endpoint};
use crate::error::ProtocolError;

const READ_CHUNK: usize = 8 * 1024;

/// Identifies one attempt in logs and delegate callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    SendingRequest,
    ReadingHeaders,
    ReadingBody,
    Complete,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connecting => "connecting",
            Phase::SendingRequest => "sending request",
            Phase::ReadingHeaders => "reading headers",
            Phase::ReadingBody => "reading body",
            Phase::Complete => "complete",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct ConnectionState {
    attempt: AttemptId,
    stream: Option<BoxedTransport>,
    buffer: BytesMut,
    phase: Phase,
    auth_attempts: u32,
}

/// Runs a single attempt: connect, write the request, read one response, close.
pub struct ConnectionDriver<'a> {
    connector: &'a dyn Connector,
    config: &'a ProtocolConfig,
    cancel: CancellationToken,
    phases: watch::Sender<Phase>,
    state: ConnectionState,
}

impl<'a> ConnectionDriver<'a> {
    pub fn new(
        connector: &'a dyn Connector,
        config: &'a ProtocolConfig,
        cancel: CancellationToken,
        auth_attempts: u32,
    ) -> Self {
        let (phases, _) = watch::channel(Phase::Connecting);
        Self {
            connector,
            config,
            cancel,
            phases,
            state: ConnectionState {
                attempt: AttemptId::new(),
                stream: None,
                buffer: BytesMut::new(),
                phase: Phase::Connecting,
                auth_attempts,
            },
        }
    }

    pub fn attempt(&self) -> AttemptId {
        self.state.attempt
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Authentication attempts made for the logical request before this one.
    pub fn auth_attempts(&self) -> u32 {
        self.state.auth_attempts
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phases.subscribe()
    }

    /// Drives the attempt to `Complete` or `Failed`. The stream is closed before this
    /// returns, whatever the outcome.
    pub async fn run(mut self, request: &Request) -> Result<Response, ProtocolError> {
        let result = self.drive(request).await;
        if let Err(err) = &result {
            debug!(attempt = %self.state.attempt, phase = %self.state.phase, error = %err, "attempt failed");
            self.transition(Phase::Failed);
        }
        self.state.stream = None;
        self.state.buffer.clear();
        result
    }

    async fn drive(&mut self, request: &Request) -> Result<Response, ProtocolError> {
        let endpoint = Endpoint::from_url(&request.url)?;
        let wire = serialize_request(request)
            .map_err(|err| ProtocolError::InvalidRequest(err.to_string()))?;
        self.check_cancelled()?;
        debug!(attempt = %self.state.attempt, %endpoint, "connecting");
        let stream = guarded(
            &self.cancel,
            Phase::Connecting,
            self.config.timeouts.connect(),
            self.connector.connect(&endpoint),
        )
        .await?
        .map_err(|source| ProtocolError::Connect {
            target: endpoint.to_string(),
            source,
        })?;
        self.state.stream = Some(stream);

        self.transition(Phase::SendingRequest);
        self.send(&wire).await?;

        self.transition(Phase::ReadingHeaders);
        let head = self.read_head().await?;

        self.transition(Phase::ReadingBody);
        let framing = BodyFraming::for_response(&request.method, &head);
        trace!(attempt = %self.state.attempt, ?framing, "body framing");
        let (body, trailers) = self.read_body(framing).await?;

        self.transition(Phase::Complete);
        debug!(
            attempt = %self.state.attempt,
            status = head.status_code(),
            bytes = body.len(),
            "response complete"
        );
        Ok(Response::from_parts(head, body, trailers))
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let stream = connected(&mut self.state.stream).map_err(ProtocolError::Write)?;
        let write = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        guarded(
            &self.cancel,
            Phase::SendingRequest,
            self.config.timeouts.write(),
            write,
        )
        .await?
        .map_err(ProtocolError::Write)
    }

    async fn read_head(&mut self) -> Result<ResponseHead, ProtocolError> {
        let limits = self.config.limits.to_limits();
        loop {
            self.check_cancelled()?;
            match parse_response_head(&self.state.buffer, limits)? {
                HeadStatus::Complete { head, consumed } => {
                    self.state.buffer.advance(consumed);
                    if head.is_interim() {
                        trace!(attempt = %self.state.attempt, status = head.status_code(), "skipping interim response");
                        continue;
                    }
                    return Ok(head);
                }
                HeadStatus::NeedMore => {
                    if self.fill().await? == 0 {
                        return Err(ParseError {
                            kind: ParseErrorKind::UnexpectedEof,
                            offset: self.state.buffer.len(),
                        }
                        .into());
                    }
                }
            }
        }
    }

    async fn read_body(&mut self, framing: BodyFraming) -> Result<(Vec<u8>, Headers), ProtocolError> {
        let mut decoder = BodyDecoder::new(framing, self.config.limits.to_limits());
        let mut body = Vec::new();
        loop {
            self.check_cancelled()?;
            if !self.state.buffer.is_empty() {
                let consumed = decoder.decode(&self.state.buffer, &mut body)?;
                self.state.buffer.advance(consumed);
            }
            if decoder.is_complete() {
                break;
            }
            if self.fill().await? == 0 {
                decoder
                    .finish_eof()
                    .map_err(|_| ProtocolError::TruncatedBody {
                        expected: decoder.expected_len(),
                        received: decoder.received(),
                    })?;
                break;
            }
        }
        Ok((body, decoder.take_trailers()))
    }

    /// Reads whatever is available into the receive buffer; `0` means the peer closed.
    async fn fill(&mut self) -> Result<usize, ProtocolError> {
        let phase = self.state.phase;
        let stream = connected(&mut self.state.stream).map_err(ProtocolError::Read)?;
        let buffer = &mut self.state.buffer;
        buffer.reserve(READ_CHUNK);
        let read = guarded(
            &self.cancel,
            phase,
            self.config.timeouts.read(),
            stream.read_buf(buffer),
        )
        .await?
        .map_err(ProtocolError::Read)?;
        trace!(attempt = %self.state.attempt, read, "read");
        Ok(read)
    }

    fn check_cancelled(&self) -> Result<(), ProtocolError> {
        if self.cancel.is_cancelled() {
            return Err(ProtocolError::Cancelled);
        }
        Ok(())
    }

    fn transition(&mut self, next: Phase) {
        if self.state.phase.is_terminal() {
            return;
        }
        trace!(attempt = %self.state.attempt, from = %self.state.phase, to = %next, "phase");
        self.state.phase = next;
        self.phases.send_replace(next);
    }
}

fn connected(stream: &mut Option<BoxedTransport>) -> io::Result<&mut BoxedTransport> {
    stream
        .as_mut()
        .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
}

/// Races `io` against cancellation and the phase timeout.
async fn guarded<T, F>(
    cancel: &CancellationToken,
    phase: Phase,
    timeout: Duration,
    io: F,
) -> Result<T, ProtocolError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProtocolError::Cancelled),
        result = tokio::time::timeout(timeout, io) => {
            result.map_err(|_| ProtocolError::Timeout { phase })
        }
    }
}
