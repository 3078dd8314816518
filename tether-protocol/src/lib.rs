//! Client engine that services HTTP(S) requests itself: it connects, writes the
//! request, parses the response, answers authentication challenges through a
//! delegate, and removes gzip/deflate content codings before handing the response
//! to the host.

pub mod auth;
mod config;
mod connection;
mod connector;
mod error;
mod events;
mod handler;
mod registry;

pub use auth::{
    AuthDelegate, AuthOutcome, AuthScheme, AuthenticationMediator, ChallengeAnswer,
    ChallengeContext, ChallengeDetails, Credentials, GiveUpReason, NoCredentials,
    StaticCredentials,
};
pub use config::{AuthConfig, HeaderConfig, LimitsConfig, ProtocolConfig, TimeoutConfig};
pub use connection::{AttemptId, ConnectionDriver, Phase};
pub use connector::{BoxedTransport, Connector, Endpoint, TcpConnector, Transport};
pub use error::{ConfigError, ErrorKind, ProtocolError};
pub use events::{ChannelSink, ProtocolEvent, ProtocolEvents, ResultSink, event_channel};
pub use handler::{Protocol, ProtocolHandler};
pub use registry::ProtocolRegistry;
