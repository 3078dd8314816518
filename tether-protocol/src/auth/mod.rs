//! Challenge/response handling for 401 and 407 responses.

mod challenge;
mod delegate;
mod digest;
#[cfg(test)]
mod digest_test;
#[cfg(test)]
mod mediator_test;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use tether_codec::base64_encode_str;
use tether_net::{Header, Request, Response};

use crate::connection::AttemptId;

pub use challenge::{Challenge, parse_challenges};
pub use delegate::{
    AuthDelegate, ChallengeAnswer, ChallengeDetails, Credentials, NoCredentials,
    StaticCredentials,
};
pub use digest::{
    DigestAlgorithm, DigestChallenge, DigestInput, digest_authorization, digest_response,
    generate_cnonce,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::Basic => f.write_str("Basic"),
            AuthScheme::Digest => f.write_str("Digest"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    AttemptsExhausted,
    Declined,
    NoSupportedScheme,
}

impl fmt::Display for GiveUpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GiveUpReason::AttemptsExhausted => f.write_str("retry limit reached"),
            GiveUpReason::Declined => f.write_str("credentials declined"),
            GiveUpReason::NoSupportedScheme => f.write_str("no supported scheme offered"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Headers to merge into the next attempt.
    Retry(Vec<Header>),
    GiveUp(GiveUpReason),
}

/// What was answered last, kept across attempts of one logical request.
#[derive(Debug, Clone)]
pub struct ChallengeContext {
    pub scheme: AuthScheme,
    pub proxy: bool,
    pub realm: Option<String>,
    pub digest: Option<DigestChallenge>,
    pub nonce_count: u32,
    pub credentials: Credentials,
    pub attempts: u32,
}

enum Selected {
    Digest(DigestChallenge),
    Basic { realm: Option<String> },
}

impl Selected {
    fn scheme(&self) -> AuthScheme {
        match self {
            Selected::Digest(_) => AuthScheme::Digest,
            Selected::Basic { .. } => AuthScheme::Basic,
        }
    }

    fn realm(&self) -> Option<String> {
        match self {
            Selected::Digest(digest) => Some(digest.realm.clone()),
            Selected::Basic { realm } => realm.clone(),
        }
    }
}

/// Digest beats Basic; among Digest offers the strongest algorithm wins, first offer on ties.
fn select(challenges: &[Challenge]) -> Option<Selected> {
    let digest = challenges
        .iter()
        .rev()
        .filter_map(DigestChallenge::from_challenge)
        .max_by_key(DigestChallenge::strength);
    if let Some(digest) = digest {
        return Some(Selected::Digest(digest));
    }
    challenges
        .iter()
        .find(|challenge| challenge.is_scheme("basic"))
        .map(|challenge| Selected::Basic {
            realm: challenge.realm().map(str::to_string),
        })
}

pub struct AuthenticationMediator {
    delegate: Arc<dyn AuthDelegate>,
    max_retries: u32,
    retries: u32,
    context: Option<ChallengeContext>,
}

impl AuthenticationMediator {
    pub fn new(delegate: Arc<dyn AuthDelegate>, max_retries: u32) -> Self {
        Self {
            delegate,
            max_retries,
            retries: 0,
            context: None,
        }
    }

    /// Retries already granted for this request.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn context(&self) -> Option<&ChallengeContext> {
        self.context.as_ref()
    }

    /// Decides how to answer a 401/407 received for `request`.
    pub async fn challenge(
        &mut self,
        attempt: AttemptId,
        response: &Response,
        request: &Request,
    ) -> AuthOutcome {
        let proxy = response.status() == 407;
        if self.retries >= self.max_retries {
            warn!(%attempt, retries = self.retries, "authentication retries exhausted");
            return AuthOutcome::GiveUp(GiveUpReason::AttemptsExhausted);
        }

        let header = if proxy {
            "proxy-authenticate"
        } else {
            "www-authenticate"
        };
        let challenges = parse_challenges(response.headers.get_all(header));
        let Some(selected) = select(&challenges) else {
            warn!(%attempt, offered = challenges.len(), "no supported authentication scheme");
            return AuthOutcome::GiveUp(GiveUpReason::NoSupportedScheme);
        };
        let scheme = selected.scheme();
        let realm = selected.realm();
        let previous = self.context.take();

        let stale_reuse = match (&selected, &previous) {
            (Selected::Digest(digest), Some(prev))
                if digest.stale && prev.proxy == proxy && prev.scheme == AuthScheme::Digest =>
            {
                Some(prev.credentials.clone())
            }
            _ => None,
        };
        let credentials = match stale_reuse {
            Some(credentials) => {
                debug!(%attempt, "stale nonce, reusing credentials");
                credentials
            }
            None => {
                let details = ChallengeDetails {
                    url: request.url.clone(),
                    status: response.status(),
                    proxy,
                    scheme,
                    realm: realm.clone(),
                    previous_failures: self.retries,
                };
                match self.delegate.on_challenge(attempt, &details).await {
                    ChallengeAnswer::Credentials(credentials) => credentials,
                    ChallengeAnswer::Cancel => {
                        info!(%attempt, %scheme, "delegate declined challenge");
                        return AuthOutcome::GiveUp(GiveUpReason::Declined);
                    }
                }
            }
        };

        let nonce_count = match (&selected, &previous) {
            (Selected::Digest(digest), Some(prev))
                if prev
                    .digest
                    .as_ref()
                    .is_some_and(|last| last.nonce == digest.nonce) =>
            {
                prev.nonce_count + 1
            }
            _ => 1,
        };
        let value = match &selected {
            Selected::Basic { .. } => format!(
                "Basic {}",
                base64_encode_str(&format!("{}:{}", credentials.user, credentials.password))
            ),
            Selected::Digest(digest) => {
                let cnonce = generate_cnonce();
                let uri = request.target();
                digest_authorization(
                    digest,
                    &credentials,
                    DigestInput {
                        method: request.method.as_str(),
                        uri: &uri,
                        nonce_count,
                        cnonce: &cnonce,
                    },
                )
            }
        };

        self.retries += 1;
        info!(%attempt, %scheme, proxy, retry = self.retries, "answering authentication challenge");
        let name = if proxy {
            "Proxy-Authorization"
        } else {
            "Authorization"
        };
        self.context = Some(ChallengeContext {
            scheme,
            proxy,
            realm,
            digest: match selected {
                Selected::Digest(digest) => Some(digest),
                Selected::Basic { .. } => None,
            },
            nonce_count,
            credentials,
            attempts: self.retries,
        });
        AuthOutcome::Retry(vec![Header::new(name, value)])
    }
}
