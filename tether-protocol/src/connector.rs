use std::fmt;
use std::io;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use tether_net::Url;

use crate::error::ProtocolError;

/// A connected byte stream, plain or TLS.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

pub type BoxedTransport = Box<dyn Transport>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl Endpoint {
    pub fn from_url(url: &Url) -> Result<Self, ProtocolError> {
        let host = url
            .host_str()
            .ok_or_else(|| ProtocolError::InvalidRequest(format!("{url} has no host")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ProtocolError::InvalidRequest(format!("{url} has no port")))?;
        Ok(Self {
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port,
            secure: url.scheme().eq_ignore_ascii_case("https"),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Opens the stream for one attempt.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, io::Result<BoxedTransport>>;
}

/// TCP with TLS for `https` endpoints.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    accept_invalid_certs: bool,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips certificate validation. Only for test servers.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    async fn open(&self, endpoint: &Endpoint) -> io::Result<BoxedTransport> {
        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
        tcp.set_nodelay(true)?;
        if !endpoint.secure {
            return Ok(Box::new(tcp));
        }
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(io::Error::other)?;
        let tls = tokio_native_tls::TlsConnector::from(tls);
        let stream = tls
            .connect(&endpoint.host, tcp)
            .await
            .map_err(io::Error::other)?;
        Ok(Box::new(stream))
    }
}

impl Connector for TcpConnector {
    fn connect<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, io::Result<BoxedTransport>> {
        self.open(endpoint).boxed()
    }
}

#[cfg(test)]
mod tests {
    use tether_net::Url;

    use super::Endpoint;

    #[test]
    fn endpoint_uses_default_ports() {
        let plain = Endpoint::from_url(&Url::parse("http://example.com/a").unwrap()).unwrap();
        assert_eq!(plain.port, 80);
        assert!(!plain.secure);

        let tls = Endpoint::from_url(&Url::parse("https://example.com:8443/").unwrap()).unwrap();
        assert_eq!(tls.port, 8443);
        assert!(tls.secure);
        assert_eq!(tls.to_string(), "example.com:8443");
    }

    #[test]
    fn endpoint_strips_ipv6_brackets() {
        let endpoint = Endpoint::from_url(&Url::parse("http://[::1]:8080/").unwrap()).unwrap();
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.to_string(), "[::1]:8080");
    }
}
