use base64::Engine;

pub fn base64_encode_bytes(input: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(input)
}

pub fn base64_encode_str(input: &str) -> String {
    base64_encode_bytes(input.as_bytes())
}
