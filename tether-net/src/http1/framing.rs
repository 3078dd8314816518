use http::Method;

use super::headers::Headers;
use super::parser::content_length;
use super::types::{Header, Limits, ParseError, ParseErrorKind, ResponseHead};

const CRLF: &[u8] = b"\r\n";
const MAX_LINE_BYTES: usize = 8 * 1024;

/// How the length of a response body is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    Empty,
    Chunked,
    ContentLength(u64),
    CloseDelimited,
}

impl BodyFraming {
    /// Chunked transfer coding takes priority over Content-Length, which takes priority
    /// over reading until the peer closes.
    pub fn for_response(method: &Method, head: &ResponseHead) -> Self {
        let status = head.status_code();
        if *method == Method::HEAD || status / 100 == 1 || status == 204 || status == 304 {
            return BodyFraming::Empty;
        }

        if head.headers.contains("transfer-encoding") {
            if head.headers.has_token("transfer-encoding", "chunked") {
                return BodyFraming::Chunked;
            }
            return BodyFraming::CloseDelimited;
        }

        match content_length(&head.headers) {
            Some(0) => BodyFraming::Empty,
            Some(length) => BodyFraming::ContentLength(length),
            None => BodyFraming::CloseDelimited,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DecodeState {
    Length { remaining: u64 },
    Chunk(ChunkState),
    UntilClose,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChunkState {
    Size { line: Vec<u8> },
    Data { remaining: u64 },
    DataCrlf { seen: usize },
    Trailer { line: Vec<u8> },
}

/// Incremental body decoder for one response. Bytes are pushed as they arrive;
/// decoding stops at the end of the message so trailing bytes are left unconsumed.
#[derive(Debug, Clone)]
pub struct BodyDecoder {
    framing: BodyFraming,
    limits: Limits,
    state: DecodeState,
    received: u64,
    wire_offset: usize,
    trailers: Headers,
}

impl BodyDecoder {
    pub fn new(framing: BodyFraming, limits: Limits) -> Self {
        let state = match framing {
            BodyFraming::Empty => DecodeState::Done,
            BodyFraming::ContentLength(remaining) => DecodeState::Length { remaining },
            BodyFraming::Chunked => DecodeState::Chunk(ChunkState::Size { line: Vec::new() }),
            BodyFraming::CloseDelimited => DecodeState::UntilClose,
        };
        Self {
            framing,
            limits,
            state,
            received: 0,
            wire_offset: 0,
            trailers: Headers::new(),
        }
    }

    pub fn framing(&self) -> BodyFraming {
        self.framing
    }

    pub fn is_complete(&self) -> bool {
        self.state == DecodeState::Done
    }

    /// Body bytes produced so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn expected_len(&self) -> Option<u64> {
        match self.framing {
            BodyFraming::ContentLength(length) => Some(length),
            BodyFraming::Empty => Some(0),
            _ => None,
        }
    }

    pub fn take_trailers(&mut self) -> Headers {
        std::mem::take(&mut self.trailers)
    }

    /// Decodes as much of `input` as belongs to this body, appending payload bytes to
    /// `body`. Returns the number of input bytes consumed.
    pub fn decode(&mut self, input: &[u8], body: &mut Vec<u8>) -> Result<usize, ParseError> {
        let mut cursor = 0;

        while cursor < input.len() {
            let state = std::mem::replace(&mut self.state, DecodeState::Done);
            let rest = &input[cursor..];
            self.state = match state {
                DecodeState::Done => {
                    self.state = DecodeState::Done;
                    break;
                }
                DecodeState::UntilClose => {
                    self.accept(rest, body, cursor)?;
                    cursor = input.len();
                    DecodeState::UntilClose
                }
                DecodeState::Length { remaining } => {
                    let take = bounded(remaining, rest.len());
                    self.accept(&rest[..take], body, cursor)?;
                    cursor += take;
                    let remaining = remaining - take as u64;
                    if remaining == 0 {
                        DecodeState::Done
                    } else {
                        DecodeState::Length { remaining }
                    }
                }
                DecodeState::Chunk(chunk) => {
                    let (next, used) = self.decode_chunked(chunk, rest, body, cursor)?;
                    cursor += used;
                    next
                }
            };
        }

        self.wire_offset += cursor;
        Ok(cursor)
    }

    /// Called when the peer closed the stream. Only a read-until-close body may end here.
    pub fn finish_eof(&mut self) -> Result<(), ParseError> {
        match self.state {
            DecodeState::Done => Ok(()),
            DecodeState::UntilClose => {
                self.state = DecodeState::Done;
                Ok(())
            }
            _ => Err(ParseError::new(
                ParseErrorKind::UnexpectedEof,
                self.wire_offset,
            )),
        }
    }

    fn decode_chunked(
        &mut self,
        chunk: ChunkState,
        input: &[u8],
        body: &mut Vec<u8>,
        base: usize,
    ) -> Result<(DecodeState, usize), ParseError> {
        let offset = self.wire_offset + base;
        match chunk {
            ChunkState::Size { mut line } => {
                let Some(used) = take_line(&mut line, input, offset)? else {
                    return Ok((DecodeState::Chunk(ChunkState::Size { line }), input.len()));
                };
                let size = parse_chunk_size(&line, offset)?;
                if self.received.saturating_add(size) > self.limits.max_body_bytes as u64 {
                    return Err(ParseError::new(ParseErrorKind::BodyTooLarge, offset));
                }
                let next = if size == 0 {
                    ChunkState::Trailer { line: Vec::new() }
                } else {
                    ChunkState::Data { remaining: size }
                };
                Ok((DecodeState::Chunk(next), used))
            }
            ChunkState::Data { remaining } => {
                let take = bounded(remaining, input.len());
                self.accept(&input[..take], body, base)?;
                let remaining = remaining - take as u64;
                let next = if remaining == 0 {
                    ChunkState::DataCrlf { seen: 0 }
                } else {
                    ChunkState::Data { remaining }
                };
                Ok((DecodeState::Chunk(next), take))
            }
            ChunkState::DataCrlf { mut seen } => {
                let mut used = 0;
                while seen < CRLF.len() && used < input.len() {
                    if input[used] != CRLF[seen] {
                        return Err(ParseError::new(
                            ParseErrorKind::InvalidChunkTerminator,
                            offset + used,
                        ));
                    }
                    seen += 1;
                    used += 1;
                }
                let next = if seen == CRLF.len() {
                    ChunkState::Size { line: Vec::new() }
                } else {
                    ChunkState::DataCrlf { seen }
                };
                Ok((DecodeState::Chunk(next), used))
            }
            ChunkState::Trailer { mut line } => {
                let Some(used) = take_line(&mut line, input, offset)? else {
                    return Ok((DecodeState::Chunk(ChunkState::Trailer { line }), input.len()));
                };
                let content = &line[..line.len() - CRLF.len()];
                if content.is_empty() {
                    return Ok((DecodeState::Done, used));
                }
                let text = String::from_utf8_lossy(content);
                let (name, value) = text
                    .split_once(':')
                    .ok_or_else(|| ParseError::new(ParseErrorKind::InvalidHeader, offset))?;
                self.trailers.push(Header::new(name.trim(), value.trim()));
                Ok((
                    DecodeState::Chunk(ChunkState::Trailer { line: Vec::new() }),
                    used,
                ))
            }
        }
    }

    fn accept(&mut self, bytes: &[u8], body: &mut Vec<u8>, base: usize) -> Result<(), ParseError> {
        if self.received + bytes.len() as u64 > self.limits.max_body_bytes as u64 {
            return Err(ParseError::new(
                ParseErrorKind::BodyTooLarge,
                self.wire_offset + base,
            ));
        }
        body.extend_from_slice(bytes);
        self.received += bytes.len() as u64;
        Ok(())
    }
}

fn bounded(remaining: u64, available: usize) -> usize {
    usize::try_from(remaining).map_or(available, |remaining| remaining.min(available))
}

/// Appends bytes up to and including the next LF. Returns how many input bytes were
/// used once the line (ending in CRLF) is complete.
fn take_line(line: &mut Vec<u8>, input: &[u8], offset: usize) -> Result<Option<usize>, ParseError> {
    match input.iter().position(|byte| *byte == b'\n') {
        Some(index) => {
            line.extend_from_slice(&input[..=index]);
            if !line.ends_with(CRLF) {
                return Err(ParseError::new(ParseErrorKind::InvalidChunkSize, offset));
            }
            Ok(Some(index + 1))
        }
        None => {
            line.extend_from_slice(input);
            if line.len() > MAX_LINE_BYTES {
                return Err(ParseError::new(ParseErrorKind::InvalidChunkSize, offset));
            }
            Ok(None)
        }
    }
}

fn parse_chunk_size(line: &[u8], offset: usize) -> Result<u64, ParseError> {
    let invalid = || ParseError::new(ParseErrorKind::InvalidChunkSize, offset);
    let text = std::str::from_utf8(&line[..line.len() - CRLF.len()]).map_err(|_| invalid())?;
    let size = text.split(';').next().unwrap_or("").trim();
    if size.is_empty() || !size.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    u64::from_str_radix(size, 16).map_err(|_| invalid())
}
