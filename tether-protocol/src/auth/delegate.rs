use std::fmt;

use futures::FutureExt;
use futures::future::BoxFuture;
use tether_net::Url;

use crate::connection::AttemptId;

use super::AuthScheme;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What the delegate is told about a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeDetails {
    pub url: Url,
    pub status: u16,
    pub proxy: bool,
    pub scheme: AuthScheme,
    pub realm: Option<String>,
    /// Credentialed attempts already rejected for this request.
    pub previous_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeAnswer {
    Credentials(Credentials),
    Cancel,
}

/// Supplies credentials for authentication challenges. The attempt waits on the
/// returned future; at most one call is outstanding per attempt.
pub trait AuthDelegate: Send + Sync {
    fn on_challenge<'a>(
        &'a self,
        attempt: AttemptId,
        details: &'a ChallengeDetails,
    ) -> BoxFuture<'a, ChallengeAnswer>;
}

/// Answers every challenge with the same credentials, optionally only for one realm.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: Credentials,
    realm: Option<String>,
}

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            realm: None,
        }
    }

    pub fn for_realm(credentials: Credentials, realm: impl Into<String>) -> Self {
        Self {
            credentials,
            realm: Some(realm.into()),
        }
    }
}

impl AuthDelegate for StaticCredentials {
    fn on_challenge<'a>(
        &'a self,
        _attempt: AttemptId,
        details: &'a ChallengeDetails,
    ) -> BoxFuture<'a, ChallengeAnswer> {
        let matches = match &self.realm {
            Some(realm) => details.realm.as_deref() == Some(realm.as_str()),
            None => true,
        };
        let answer = if matches {
            ChallengeAnswer::Credentials(self.credentials.clone())
        } else {
            ChallengeAnswer::Cancel
        };
        futures::future::ready(answer).boxed()
    }
}

/// Declines every challenge.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl AuthDelegate for NoCredentials {
    fn on_challenge<'a>(
        &'a self,
        _attempt: AttemptId,
        _details: &'a ChallengeDetails,
    ) -> BoxFuture<'a, ChallengeAnswer> {
        futures::future::ready(ChallengeAnswer::Cancel).boxed()
    }
}
