use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, debug_span, info, info_span, trace, warn};

use tether_codec::{CodecError, Format, inflate, looks_like_zlib};
use tether_net::{Request, Response};

use crate::auth::{AuthDelegate, AuthOutcome, AuthenticationMediator, NoCredentials};
use crate::config::ProtocolConfig;
use crate::connection::ConnectionDriver;
use crate::connector::{Connector, TcpConnector};
use crate::error::ProtocolError;
use crate::events::ResultSink;

/// Shared engine definition. Cheap to share behind an `Arc`; every request gets its own
/// [`ProtocolHandler`].
pub struct Protocol {
    config: ProtocolConfig,
    connector: Arc<dyn Connector>,
    delegate: Arc<dyn AuthDelegate>,
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Protocol {
    pub fn new(config: ProtocolConfig) -> Self {
        Self {
            config,
            connector: Arc::new(TcpConnector::new()),
            delegate: Arc::new(NoCredentials),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn AuthDelegate>) -> Self {
        self.delegate = delegate;
        self
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn can_handle(&self, request: &Request) -> bool {
        self.config.claims_scheme(request.scheme())
    }

    pub fn handler(self: &Arc<Self>, request: Request) -> ProtocolHandler {
        ProtocolHandler {
            protocol: Arc::clone(self),
            request,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    fn prepare(&self, request: &Request) -> Request {
        let mut prepared = request.clone();
        let defaults = &self.config.headers;
        if !defaults.user_agent.is_empty() && !prepared.headers.contains("user-agent") {
            prepared
                .headers
                .set("User-Agent", defaults.user_agent.as_str());
        }
        if defaults.accept_compressed && !prepared.headers.contains("accept-encoding") {
            prepared.headers.set("Accept-Encoding", "gzip, deflate");
        }
        if !prepared.headers.contains("connection") {
            prepared.headers.set("Connection", "close");
        }
        prepared
    }

    async fn service(
        &self,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response, ProtocolError> {
        if !self.can_handle(request) {
            return Err(ProtocolError::InvalidRequest(format!(
                "scheme {} is not claimed",
                request.scheme()
            )));
        }
        let mut current = self.prepare(request);
        let mut mediator = AuthenticationMediator::new(
            Arc::clone(&self.delegate),
            self.config.auth.max_retries,
        );

        loop {
            let driver = ConnectionDriver::new(
                self.connector.as_ref(),
                &self.config,
                cancel.clone(),
                mediator.retries(),
            );
            let attempt = driver.attempt();
            let response = driver
                .run(&current)
                .instrument(debug_span!("attempt", id = %attempt))
                .await?;
            if cancel.is_cancelled() {
                return Err(ProtocolError::Cancelled);
            }
            if !response.is_challenge() {
                return decode_content(response);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProtocolError::Cancelled),
                outcome = mediator.challenge(attempt, &response, &current) => outcome,
            };
            match outcome {
                AuthOutcome::Retry(headers) => current = current.with_headers(headers),
                AuthOutcome::GiveUp(reason) => {
                    warn!(%reason, status = response.status(), "authentication abandoned");
                    return Err(ProtocolError::AuthGiveUp {
                        reason,
                        response: Box::new(response),
                    });
                }
            }
        }
    }
}

/// Removes `Content-Encoding` codings from the body. Unknown codings leave the body
/// as received.
fn decode_content(mut response: Response) -> Result<Response, ProtocolError> {
    if response.body.is_empty() {
        return Ok(response);
    }
    let codings: Vec<String> = response
        .headers
        .get_all("content-encoding")
        .flat_map(|value| value.split(','))
        .map(|coding| coding.trim().to_ascii_lowercase())
        .filter(|coding| !coding.is_empty() && coding != "identity")
        .collect();

    let mut decoded: Option<Vec<u8>> = None;
    for coding in codings.iter().rev() {
        let input = decoded.as_deref().unwrap_or(&response.body);
        let output = match coding.as_str() {
            "gzip" | "x-gzip" => inflate(input, Format::Gzip)?,
            "deflate" => inflate_deflate(input)?,
            other => {
                debug!(coding = other, "unsupported content coding, body left encoded");
                return Ok(response);
            }
        };
        decoded = Some(output);
    }
    response.decoded_body = decoded;
    Ok(response)
}

/// `deflate` should be zlib-wrapped, but servers also send raw streams and some of those
/// begin with two bytes that pass the zlib header check.
fn inflate_deflate(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    if looks_like_zlib(input) {
        match inflate(input, Format::Zlib) {
            Ok(output) => return Ok(output),
            Err(err) => trace!(error = %err, "zlib inflate failed, retrying as raw deflate"),
        }
    }
    inflate(input, Format::Deflate)
}

fn request_span(request: &Request) -> Span {
    info_span!("request", method = %request.method, url = %request.url)
}

fn deliver<S: ResultSink>(result: Result<Response, ProtocolError>, mut sink: S) {
    match result {
        Ok(response) => {
            info!(status = response.status(), "request finished");
            sink.received_response(&response);
            sink.received_data(response.decoded());
            sink.finished();
        }
        Err(error) => {
            info!(kind = %error.kind(), %error, "request failed");
            sink.failed(error);
        }
    }
}

/// Services one request for its [`Protocol`].
pub struct ProtocolHandler {
    protocol: Arc<Protocol>,
    request: Request,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProtocolHandler {
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.protocol
    }

    pub fn can_handle(&self, request: &Request) -> bool {
        self.protocol.can_handle(request)
    }

    /// Spawns the request on the current runtime; the outcome goes to `sink`. A second
    /// call is ignored.
    pub fn start<S: ResultSink + 'static>(&mut self, sink: S) {
        if self.task.is_some() {
            warn!(url = %self.request.url, "handler already started");
            return;
        }
        let protocol = Arc::clone(&self.protocol);
        let request = self.request.clone();
        let cancel = self.cancel.clone();
        let span = request_span(&request);
        self.task = Some(tokio::spawn(
            async move {
                let mut result = protocol.service(&request, &cancel).await;
                // A stop that lands after the last await still wins.
                if cancel.is_cancelled() {
                    result = Err(ProtocolError::Cancelled);
                }
                deliver(result, sink);
            }
            .instrument(span),
        ));
    }

    /// Runs the request on the caller's task instead of spawning it.
    pub async fn execute(&self) -> Result<Response, ProtocolError> {
        self.protocol
            .service(&self.request, &self.cancel)
            .instrument(request_span(&self.request))
            .await
    }

    /// Cancels the active attempt. Calling it again has no effect.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!(url = %self.request.url, "stopping request");
            self.cancel.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits until a started request has delivered its outcome.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "request task ended abnormally");
            }
        }
    }
}
