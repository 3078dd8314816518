use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use tether_net::Response;

use crate::error::ProtocolError;

/// Receives the outcome of one request. On success the calls arrive as
/// `received_response`, `received_data`, `finished`; on failure only `failed`.
pub trait ResultSink: Send {
    fn received_response(&mut self, response: &Response);
    fn received_data(&mut self, data: &[u8]);
    fn finished(&mut self);
    fn failed(&mut self, error: ProtocolError);
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn received_response(&mut self, response: &Response) {
        (**self).received_response(response)
    }

    fn received_data(&mut self, data: &[u8]) {
        (**self).received_data(data)
    }

    fn finished(&mut self) {
        (**self).finished()
    }

    fn failed(&mut self, error: ProtocolError) {
        (**self).failed(error)
    }
}

#[derive(Debug)]
pub enum ProtocolEvent {
    ResponseReceived(Box<Response>),
    DataReceived(Vec<u8>),
    Finished,
    Failed(ProtocolError),
}

impl ProtocolEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProtocolEvent::Finished | ProtocolEvent::Failed(_))
    }
}

pub type ProtocolEvents = ReceiverStream<ProtocolEvent>;

/// Forwards sink calls into an event stream.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<ProtocolEvent>,
}

impl ChannelSink {
    fn emit(&self, event: ProtocolEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.sender.try_send(event);
    }
}

impl ResultSink for ChannelSink {
    fn received_response(&mut self, response: &Response) {
        self.emit(ProtocolEvent::ResponseReceived(Box::new(response.clone())));
    }

    fn received_data(&mut self, data: &[u8]) {
        self.emit(ProtocolEvent::DataReceived(data.to_vec()));
    }

    fn finished(&mut self) {
        self.emit(ProtocolEvent::Finished);
    }

    fn failed(&mut self, error: ProtocolError) {
        self.emit(ProtocolEvent::Failed(error));
    }
}

pub fn event_channel() -> (ChannelSink, ProtocolEvents) {
    let (sender, receiver) = mpsc::channel(16);
    (ChannelSink { sender }, ReceiverStream::new(receiver))
}
