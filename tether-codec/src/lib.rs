mod compress;
mod encode;
mod error;
mod hash;

pub use compress::{Deflater, Format, Inflater, deflate, inflate, looks_like_zlib};
pub use encode::{base64_encode_bytes, base64_encode_str};
pub use error::CodecError;
pub use hash::{md5_hex, sha256_hex};
