use std::io::Write;

use flate2::Compression;
use flate2::write::{DeflateEncoder, GzDecoder, GzEncoder, ZlibEncoder};
use flate2::{Decompress, FlushDecompress, Status};

use crate::CodecError;

const OUTPUT_CHUNK: usize = 32 * 1024;

/// Container format of a compressed byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// RFC 1952 gzip member.
    Gzip,
    /// RFC 1950 zlib stream (what HTTP calls `deflate`).
    Zlib,
    /// RFC 1951 deflate data without any wrapper.
    Deflate,
}

/// Incremental decoder. Feed input with [`Inflater::push`] as it arrives, then call
/// [`Inflater::finish`] to confirm the stream was complete.
pub struct Inflater {
    inner: InflaterKind,
}

enum InflaterKind {
    Gzip(GzDecoder<Vec<u8>>),
    Flate { state: Decompress, stream_end: bool },
}

impl Inflater {
    pub fn new(format: Format) -> Self {
        let inner = match format {
            Format::Gzip => InflaterKind::Gzip(GzDecoder::new(Vec::new())),
            Format::Zlib => InflaterKind::Flate {
                state: Decompress::new(true),
                stream_end: false,
            },
            Format::Deflate => InflaterKind::Flate {
                state: Decompress::new(false),
                stream_end: false,
            },
        };
        Self { inner }
    }

    /// Decodes `input` and returns whatever output became available.
    pub fn push(&mut self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        match &mut self.inner {
            InflaterKind::Gzip(decoder) => {
                let mut cursor = 0;
                while cursor < input.len() {
                    let written = decoder
                        .write(&input[cursor..])
                        .map_err(|err| CodecError::Decode(err.to_string()))?;
                    if written == 0 {
                        break;
                    }
                    cursor += written;
                }
                Ok(std::mem::take(decoder.get_mut()))
            }
            InflaterKind::Flate { state, stream_end } => inflate_flate(state, stream_end, input),
        }
    }

    /// Flushes remaining output. Fails when the stream ended early or the trailer is bad.
    pub fn finish(self) -> Result<Vec<u8>, CodecError> {
        match self.inner {
            InflaterKind::Gzip(decoder) => decoder
                .finish()
                .map_err(|err| CodecError::Decode(err.to_string())),
            InflaterKind::Flate {
                mut state,
                mut stream_end,
            } => {
                let tail = inflate_flate(&mut state, &mut stream_end, &[])?;
                if !stream_end {
                    return Err(CodecError::Decode("truncated stream".to_string()));
                }
                Ok(tail)
            }
        }
    }
}

fn inflate_flate(
    state: &mut Decompress,
    stream_end: &mut bool,
    input: &[u8],
) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::new();
    let mut cursor = 0;

    while !*stream_end {
        if output.capacity() - output.len() < OUTPUT_CHUNK {
            output.reserve(OUTPUT_CHUNK);
        }
        let in_before = state.total_in();
        let out_before = state.total_out();
        let status = state
            .decompress_vec(&input[cursor..], &mut output, FlushDecompress::None)
            .map_err(|err| CodecError::Decode(err.to_string()))?;
        let consumed = (state.total_in() - in_before) as usize;
        let produced = state.total_out() - out_before;
        cursor += consumed;

        match status {
            Status::StreamEnd => *stream_end = true,
            Status::Ok | Status::BufError => {
                if consumed == 0 && produced == 0 {
                    break;
                }
                if cursor == input.len() && output.len() < output.capacity() {
                    break;
                }
            }
        }
    }

    Ok(output)
}

/// Incremental encoder, the counterpart of [`Inflater`].
pub struct Deflater {
    inner: DeflaterKind,
}

enum DeflaterKind {
    Gzip(GzEncoder<Vec<u8>>),
    Zlib(ZlibEncoder<Vec<u8>>),
    Deflate(DeflateEncoder<Vec<u8>>),
}

impl Deflater {
    pub fn new(format: Format) -> Self {
        let level = Compression::default();
        let inner = match format {
            Format::Gzip => DeflaterKind::Gzip(GzEncoder::new(Vec::new(), level)),
            Format::Zlib => DeflaterKind::Zlib(ZlibEncoder::new(Vec::new(), level)),
            Format::Deflate => DeflaterKind::Deflate(DeflateEncoder::new(Vec::new(), level)),
        };
        Self { inner }
    }

    pub fn push(&mut self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let result = match &mut self.inner {
            DeflaterKind::Gzip(encoder) => encoder
                .write_all(input)
                .map(|_| std::mem::take(encoder.get_mut())),
            DeflaterKind::Zlib(encoder) => encoder
                .write_all(input)
                .map(|_| std::mem::take(encoder.get_mut())),
            DeflaterKind::Deflate(encoder) => encoder
                .write_all(input)
                .map(|_| std::mem::take(encoder.get_mut())),
        };
        result.map_err(|err| CodecError::Encode(err.to_string()))
    }

    pub fn finish(self) -> Result<Vec<u8>, CodecError> {
        let result = match self.inner {
            DeflaterKind::Gzip(encoder) => encoder.finish(),
            DeflaterKind::Zlib(encoder) => encoder.finish(),
            DeflaterKind::Deflate(encoder) => encoder.finish(),
        };
        result.map_err(|err| CodecError::Encode(err.to_string()))
    }
}

pub fn inflate(input: &[u8], format: Format) -> Result<Vec<u8>, CodecError> {
    let mut inflater = Inflater::new(format);
    let mut output = inflater.push(input)?;
    output.extend(inflater.finish()?);
    Ok(output)
}

pub fn deflate(input: &[u8], format: Format) -> Result<Vec<u8>, CodecError> {
    let mut deflater = Deflater::new(format);
    let mut output = deflater.push(input)?;
    output.extend(deflater.finish()?);
    Ok(output)
}

/// Checks for a zlib header (CM = 8, FCHECK valid). Servers disagree on whether HTTP
/// `deflate` bodies are zlib-wrapped, so callers use this to pick the format.
pub fn looks_like_zlib(input: &[u8]) -> bool {
    match input {
        [cmf, flg, ..] => {
            cmf & 0x0f == 8 && cmf >> 4 <= 7 && ((u16::from(*cmf) << 8) | u16::from(*flg)) % 31 == 0
        }
        _ => false,
    }
}
