use sha2::{Digest, Sha256};

/// Lowercase hex MD5, the form Digest authentication puts on the wire.
pub fn md5_hex(input: impl AsRef<[u8]>) -> String {
    format!("{:x}", md5::compute(input))
}

/// Lowercase hex SHA-256 for the `SHA-256` and `SHA-256-sess` Digest algorithms.
pub fn sha256_hex(input: impl AsRef<[u8]>) -> String {
    format!("{:x}", Sha256::digest(input))
}
