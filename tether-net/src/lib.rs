//! HTTP/1.1 message model: requests, responses, an ordered header map, the request
//! serializer, and a pull-based response parser that never blocks.

mod http1;

pub use http1::{
    BodyDecoder, BodyFraming, HeadStatus, Header, Headers, HttpVersion, Limits, ParseError,
    ParseErrorKind, Request, RequestBuilder, Response, ResponseHead, SerializeError, StatusLine,
    parse_response_head, serialize_request, serialize_response_head,
};

pub use http::Method;
pub use url::Url;
