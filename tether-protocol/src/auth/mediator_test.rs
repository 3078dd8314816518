use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use assert_matches::assert_matches;
use futures::FutureExt;
use futures::future::BoxFuture;
use tether_net::{Headers, HttpVersion, Request, Response, ResponseHead, StatusLine, Url};

use super::{
    AuthDelegate, AuthOutcome, AuthScheme, AuthenticationMediator, ChallengeAnswer,
    ChallengeDetails, Credentials, GiveUpReason, NoCredentials, StaticCredentials,
};
use crate::connection::AttemptId;

struct CountingDelegate {
    calls: AtomicU32,
    answer: ChallengeAnswer,
    last_failures: AtomicU32,
}

impl CountingDelegate {
    fn answering(answer: ChallengeAnswer) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            answer,
            last_failures: AtomicU32::new(u32::MAX),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AuthDelegate for CountingDelegate {
    fn on_challenge<'a>(
        &'a self,
        _attempt: AttemptId,
        details: &'a ChallengeDetails,
    ) -> BoxFuture<'a, ChallengeAnswer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_failures
            .store(details.previous_failures, Ordering::SeqCst);
        futures::future::ready(self.answer.clone()).boxed()
    }
}

fn challenge_response(status: u16, header: &str, values: &[&str]) -> Response {
    let mut headers = Headers::new();
    for value in values {
        headers.append(header, *value);
    }
    let head = ResponseHead {
        line: StatusLine {
            version: HttpVersion::Http11,
            status_code: status,
            reason: String::new(),
        },
        headers,
    };
    Response::from_parts(head, Vec::new(), Headers::new())
}

fn request() -> Request {
    Request::get(Url::parse("http://example.com/dir/index.html?x=1").unwrap())
}

fn aladdin() -> ChallengeAnswer {
    ChallengeAnswer::Credentials(Credentials::new("Aladdin", "open sesame"))
}

fn retry_header(outcome: AuthOutcome) -> (String, String) {
    match outcome {
        AuthOutcome::Retry(headers) => {
            assert_eq!(headers.len(), 1);
            (headers[0].name.clone(), headers[0].value.clone())
        }
        other => panic!("expected retry, got {other:?}"),
    }
}

#[tokio::test]
async fn answers_basic_challenge() {
    let delegate = CountingDelegate::answering(aladdin());
    let mut mediator = AuthenticationMediator::new(delegate.clone(), 2);
    let response = challenge_response(401, "WWW-Authenticate", &[r#"Basic realm="WallyWorld""#]);

    let outcome = mediator
        .challenge(AttemptId::new(), &response, &request())
        .await;

    let (name, value) = retry_header(outcome);
    assert_eq!(name, "Authorization");
    assert_eq!(value, "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    assert_eq!(delegate.calls(), 1);
    assert_eq!(delegate.last_failures.load(Ordering::SeqCst), 0);
    let context = mediator.context().unwrap();
    assert_eq!(context.scheme, AuthScheme::Basic);
    assert_eq!(context.realm.as_deref(), Some("WallyWorld"));
}

#[tokio::test]
async fn proxy_challenge_uses_proxy_header() {
    let mut mediator =
        AuthenticationMediator::new(CountingDelegate::answering(aladdin()), 2);
    let response = challenge_response(407, "Proxy-Authenticate", &[r#"Basic realm="proxy""#]);

    let (name, _) = retry_header(
        mediator
            .challenge(AttemptId::new(), &response, &request())
            .await,
    );
    assert_eq!(name, "Proxy-Authorization");
    assert!(mediator.context().unwrap().proxy);
}

#[tokio::test]
async fn prefers_digest_over_basic() {
    let mut mediator =
        AuthenticationMediator::new(CountingDelegate::answering(aladdin()), 2);
    let response = challenge_response(
        401,
        "WWW-Authenticate",
        &[
            r#"Basic realm="r""#,
            r#"Digest realm="r", nonce="abc", qop="auth", opaque="o""#,
        ],
    );

    let (_, value) = retry_header(
        mediator
            .challenge(AttemptId::new(), &response, &request())
            .await,
    );
    assert!(value.starts_with("Digest "));
    assert!(value.contains("uri=\"/dir/index.html?x=1\""));
    assert!(value.contains("nc=00000001"));
    assert!(value.contains("opaque=\"o\""));
}

#[tokio::test]
async fn declined_challenge_gives_up() {
    let mut mediator = AuthenticationMediator::new(Arc::new(NoCredentials), 2);
    let response = challenge_response(401, "WWW-Authenticate", &[r#"Basic realm="r""#]);

    let outcome = mediator
        .challenge(AttemptId::new(), &response, &request())
        .await;
    assert_eq!(outcome, AuthOutcome::GiveUp(GiveUpReason::Declined));
}

#[tokio::test]
async fn retries_are_bounded() {
    let delegate = CountingDelegate::answering(aladdin());
    let mut mediator = AuthenticationMediator::new(delegate.clone(), 2);
    let response = challenge_response(401, "WWW-Authenticate", &[r#"Basic realm="r""#]);

    for _ in 0..2 {
        assert_matches!(
            mediator
                .challenge(AttemptId::new(), &response, &request())
                .await,
            AuthOutcome::Retry(_)
        );
    }
    assert_eq!(delegate.last_failures.load(Ordering::SeqCst), 1);
    let outcome = mediator
        .challenge(AttemptId::new(), &response, &request())
        .await;
    assert_eq!(outcome, AuthOutcome::GiveUp(GiveUpReason::AttemptsExhausted));
    assert_eq!(delegate.calls(), 2);
    assert_eq!(mediator.retries(), 2);
}

#[tokio::test]
async fn stale_nonce_reuses_credentials() {
    let delegate = CountingDelegate::answering(aladdin());
    let mut mediator = AuthenticationMediator::new(delegate.clone(), 2);
    let first = challenge_response(
        401,
        "WWW-Authenticate",
        &[r#"Digest realm="r", nonce="one", qop="auth""#],
    );
    let stale = challenge_response(
        401,
        "WWW-Authenticate",
        &[r#"Digest realm="r", nonce="two", qop="auth", stale=true"#],
    );

    retry_header(mediator.challenge(AttemptId::new(), &first, &request()).await);
    let (_, value) = retry_header(mediator.challenge(AttemptId::new(), &stale, &request()).await);

    assert_eq!(delegate.calls(), 1);
    assert!(value.contains("nonce=\"two\""));
    assert!(value.contains("username=\"Aladdin\""));
}

#[tokio::test]
async fn repeated_nonce_increments_count() {
    let mut mediator =
        AuthenticationMediator::new(CountingDelegate::answering(aladdin()), 2);
    let response = challenge_response(
        401,
        "WWW-Authenticate",
        &[r#"Digest realm="r", nonce="same", qop="auth""#],
    );

    retry_header(mediator.challenge(AttemptId::new(), &response, &request()).await);
    let (_, value) =
        retry_header(mediator.challenge(AttemptId::new(), &response, &request()).await);
    assert!(value.contains("nc=00000002"));
    assert_eq!(mediator.context().unwrap().nonce_count, 2);
}

#[tokio::test]
async fn unsupported_scheme_gives_up_without_asking() {
    let delegate = CountingDelegate::answering(aladdin());
    let mut mediator = AuthenticationMediator::new(delegate.clone(), 2);
    let response = challenge_response(401, "WWW-Authenticate", &["Negotiate", "NTLM"]);

    let outcome = mediator
        .challenge(AttemptId::new(), &response, &request())
        .await;
    assert_eq!(outcome, AuthOutcome::GiveUp(GiveUpReason::NoSupportedScheme));
    assert_eq!(delegate.calls(), 0);
}

#[tokio::test]
async fn static_credentials_filter_by_realm() {
    let delegate = Arc::new(StaticCredentials::for_realm(
        Credentials::new("u", "p"),
        "inner",
    ));
    let mut mediator = AuthenticationMediator::new(delegate, 2);

    let other = challenge_response(401, "WWW-Authenticate", &[r#"Basic realm="outer""#]);
    assert_eq!(
        mediator
            .challenge(AttemptId::new(), &other, &request())
            .await,
        AuthOutcome::GiveUp(GiveUpReason::Declined)
    );

    let inner = challenge_response(401, "WWW-Authenticate", &[r#"Basic realm="inner""#]);
    assert_matches!(
        mediator
            .challenge(AttemptId::new(), &inner, &request())
            .await,
        AuthOutcome::Retry(_)
    );
}

#[test]
fn credentials_debug_hides_password() {
    let rendered = format!("{:?}", Credentials::new("user", "hunter2"));
    assert!(rendered.contains("user"));
    assert!(!rendered.contains("hunter2"));
}
