mod framing;
mod headers;
mod parser;
mod request;
mod types;

pub use framing::{BodyDecoder, BodyFraming};
pub use headers::Headers;
pub use parser::{HeadStatus, parse_response_head, serialize_request, serialize_response_head};
pub use request::{Request, RequestBuilder};
pub use types::{
    Header, HttpVersion, Limits, ParseError, ParseErrorKind, Response, ResponseHead,
    SerializeError, StatusLine,
};
