use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid compressed stream: {0}")]
    Decode(String),
    #[error("compression error: {0}")]
    Encode(String),
}
