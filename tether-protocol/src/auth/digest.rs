use std::fmt::Write as _;

use tether_codec::{md5_hex, sha256_hex};

use super::challenge::Challenge;
use super::delegate::Credentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Md5Sess,
    Sha256,
    Sha256Sess,
}

impl DigestAlgorithm {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "MD5" => Some(Self::Md5),
            "MD5-SESS" => Some(Self::Md5Sess),
            "SHA-256" => Some(Self::Sha256),
            "SHA-256-SESS" => Some(Self::Sha256Sess),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
            Self::Sha256 => "SHA-256",
            Self::Sha256Sess => "SHA-256-sess",
        }
    }

    pub fn is_session(self) -> bool {
        matches!(self, Self::Md5Sess | Self::Sha256Sess)
    }

    fn strength(self) -> u8 {
        match self {
            Self::Md5 | Self::Md5Sess => 0,
            Self::Sha256 | Self::Sha256Sess => 1,
        }
    }

    fn hash(self, input: &str) -> String {
        match self {
            Self::Md5 | Self::Md5Sess => md5_hex(input.as_bytes()),
            Self::Sha256 | Self::Sha256Sess => sha256_hex(input.as_bytes()),
        }
    }
}

/// The parameters of a usable Digest challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: DigestAlgorithm,
    /// `true` when the server offered `qop=auth`; `false` selects RFC 2069 mode.
    pub qop_auth: bool,
    pub stale: bool,
}

impl DigestChallenge {
    /// `None` when the challenge lacks a nonce, names an unknown algorithm, or only
    /// offers `auth-int`.
    pub fn from_challenge(challenge: &Challenge) -> Option<Self> {
        if !challenge.is_scheme("digest") {
            return None;
        }
        let nonce = challenge.param("nonce")?.to_string();
        let algorithm = match challenge.param("algorithm") {
            Some(raw) => DigestAlgorithm::parse(raw)?,
            None => DigestAlgorithm::Md5,
        };
        let qop_auth = match challenge.param("qop") {
            Some(qop) => {
                if !qop
                    .split(',')
                    .any(|option| option.trim().eq_ignore_ascii_case("auth"))
                {
                    return None;
                }
                true
            }
            None => false,
        };
        Some(Self {
            realm: challenge.realm().unwrap_or_default().to_string(),
            nonce,
            opaque: challenge.param("opaque").map(str::to_string),
            algorithm,
            qop_auth,
            stale: challenge
                .param("stale")
                .is_some_and(|value| value.eq_ignore_ascii_case("true")),
        })
    }

    /// Orders offers so that the SHA-256 family wins over MD5.
    pub fn strength(&self) -> u8 {
        self.algorithm.strength()
    }
}

/// Per-request inputs that vary between attempts.
#[derive(Debug, Clone, Copy)]
pub struct DigestInput<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub nonce_count: u32,
    pub cnonce: &'a str,
}

pub fn digest_response(
    challenge: &DigestChallenge,
    credentials: &Credentials,
    input: DigestInput<'_>,
) -> String {
    let algorithm = challenge.algorithm;
    let mut ha1 = algorithm.hash(&format!(
        "{}:{}:{}",
        credentials.user, challenge.realm, credentials.password
    ));
    if algorithm.is_session() {
        ha1 = algorithm.hash(&format!("{ha1}:{}:{}", challenge.nonce, input.cnonce));
    }
    let ha2 = algorithm.hash(&format!("{}:{}", input.method, input.uri));
    if challenge.qop_auth {
        algorithm.hash(&format!(
            "{ha1}:{}:{:08x}:{}:auth:{ha2}",
            challenge.nonce, input.nonce_count, input.cnonce
        ))
    } else {
        algorithm.hash(&format!("{ha1}:{}:{ha2}", challenge.nonce))
    }
}

/// Builds the full `Authorization` value for a Digest challenge.
pub fn digest_authorization(
    challenge: &DigestChallenge,
    credentials: &Credentials,
    input: DigestInput<'_>,
) -> String {
    let response = digest_response(challenge, credentials, input);
    let mut value = format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm={}, response=\"{}\"",
        quote(&credentials.user),
        quote(&challenge.realm),
        quote(&challenge.nonce),
        quote(input.uri),
        challenge.algorithm.name(),
        response,
    );
    if challenge.qop_auth {
        let _ = write!(
            value,
            ", qop=auth, nc={:08x}, cnonce=\"{}\"",
            input.nonce_count,
            quote(input.cnonce)
        );
    }
    if let Some(opaque) = &challenge.opaque {
        let _ = write!(value, ", opaque=\"{}\"", quote(opaque));
    }
    value
}

pub fn generate_cnonce() -> String {
    format!("{:032x}", rand::random::<u128>())
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
