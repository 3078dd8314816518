#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tether_net::Url;
use tether_protocol::{BoxedTransport, Connector, Endpoint, Protocol, ProtocolConfig};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> ProtocolConfig {
    let mut config = ProtocolConfig::default();
    config.timeouts.connect_ms = 2_000;
    config.timeouts.read_ms = 2_000;
    config.timeouts.write_ms = 2_000;
    config
}

pub fn protocol(config: ProtocolConfig) -> Arc<Protocol> {
    Arc::new(Protocol::new(config))
}

pub fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{addr}{path}")).unwrap()
}

/// Reads one request head plus its `Content-Length` body.
pub async fn read_request<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(end) = find(&buffer, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buffer[..end]).to_string();
            let body_len = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= end + 4 + body_len {
                return String::from_utf8_lossy(&buffer).to_string();
            }
        }
        let read = stream.read(&mut chunk).await.unwrap();
        if read == 0 {
            return String::from_utf8_lossy(&buffer).to_string();
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
}

pub fn header<'a>(request: &'a str, name: &str) -> Option<&'a str> {
    request
        .split("\r\n\r\n")
        .next()?
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Answers successive connections with the scripted responses, then closes each one.
/// The handle yields the requests as received.
pub async fn scripted_server(responses: Vec<Vec<u8>>) -> (SocketAddr, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for response in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            requests.push(read_request(&mut stream).await);
            let _ = stream.write_all(&response).await;
            let _ = stream.shutdown().await;
        }
        requests
    });
    (addr, handle)
}

/// Answers every connection with the same response and counts connections.
pub async fn repeating_server(response: &'static [u8]) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            read_request(&mut stream).await;
            let _ = stream.write_all(response).await;
            let _ = stream.shutdown().await;
        }
    });
    (addr, connections)
}

/// Hands out one end of an in-memory pipe instead of dialing.
pub struct PipeConnector {
    stream: Mutex<Option<DuplexStream>>,
    pub calls: AtomicUsize,
}

impl PipeConnector {
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            stream: Mutex::new(Some(stream)),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Connector for PipeConnector {
    fn connect<'a>(&'a self, _endpoint: &'a Endpoint) -> BoxFuture<'a, io::Result<BoxedTransport>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stream = self.stream.lock().unwrap().take();
        async move {
            match stream {
                Some(stream) => Ok(Box::new(stream) as BoxedTransport),
                None => Err(io::Error::from(io::ErrorKind::ConnectionRefused)),
            }
        }
        .boxed()
    }
}

/// Never completes a connection.
pub struct HangingConnector;

impl Connector for HangingConnector {
    fn connect<'a>(&'a self, _endpoint: &'a Endpoint) -> BoxFuture<'a, io::Result<BoxedTransport>> {
        futures::future::pending().boxed()
    }
}
