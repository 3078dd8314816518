use http::Method;
use url::Url;

use super::headers::Headers;
use super::types::Header;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn builder(url: Url) -> RequestBuilder {
        RequestBuilder::new(url)
    }

    pub fn get(url: Url) -> Self {
        RequestBuilder::new(url).build()
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Origin-form request target: path plus query.
    pub fn target(&self) -> String {
        let mut target = self.url.path().to_string();
        if target.is_empty() {
            target.push('/');
        }
        if let Some(query) = self.url.query() {
            target.push('?');
            target.push_str(query);
        }
        target
    }

    /// Value for the `Host` header; the port is omitted when it is the scheme default.
    pub fn authority(&self) -> Option<String> {
        let host = self.url.host_str()?;
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        Some(match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        })
    }

    /// A copy of this request with `headers` merged in (last write wins).
    pub fn with_headers(&self, headers: impl IntoIterator<Item = Header>) -> Self {
        let mut request = self.clone();
        request.headers.extend(headers);
        request
    }
}

#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    url: Url,
    headers: Headers,
    body: Option<Vec<u8>>,
}

impl RequestBuilder {
    pub fn new(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
        }
    }
}
