use std::fmt;
use std::time::SystemTime;

use log::{error, info};
use rendezvous_protocol::ConnectionId;

use crate::error::Error;

type ReadyCallback = Box<dyn FnMut() + Send>;
type MessageCallback = Box<dyn FnMut(String, SystemTime) + Send>;
type FailureCallback = Box<dyn FnMut(Error) + Send>;
type PeerLeftCallback = Box<dyn FnMut(ConnectionId) + Send>;

/// Hooks through which a session reports back to the application.
///
/// `on_channel_ready` and `on_message_received` are required, the rest is optional.
/// Failures without a handler are only logged.
pub struct Callbacks {
    on_channel_ready: ReadyCallback,
    on_message_received: MessageCallback,
    on_failure: Option<FailureCallback>,
    on_peer_left: Option<PeerLeftCallback>,
}

impl Callbacks {
    /// `on_channel_ready` runs once the data channel is open and negotiation is stable,
    /// `on_message_received` runs for every text message together with the time it arrived.
    pub fn new(
        on_channel_ready: impl FnMut() + Send + 'static,
        on_message_received: impl FnMut(String, SystemTime) + Send + 'static,
    ) -> Self {
        Self {
            on_channel_ready: Box::new(on_channel_ready),
            on_message_received: Box::new(on_message_received),
            on_failure: None,
            on_peer_left: None,
        }
    }

    /// Runs for every recoverable failure: rejected requests, failed or timed out negotiations.
    #[must_use]
    pub fn on_failure(mut self, on_failure: impl FnMut(Error) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(on_failure));
        self
    }

    /// Runs when the remote peer disconnects from the signaling server.
    #[must_use]
    pub fn on_peer_left(mut self, on_peer_left: impl FnMut(ConnectionId) + Send + 'static) -> Self {
        self.on_peer_left = Some(Box::new(on_peer_left));
        self
    }

    pub(crate) fn channel_ready(&mut self) {
        info!("data channel is ready, calling on_channel_ready");
        (self.on_channel_ready)();
    }

    pub(crate) fn message_received(&mut self, message: String, timestamp: SystemTime) {
        (self.on_message_received)(message, timestamp);
    }

    pub(crate) fn failure(&mut self, err: Error) {
        error!("session failure: {}", err);
        if let Some(on_failure) = self.on_failure.as_mut() {
            on_failure(err);
        }
    }

    pub(crate) fn peer_left(&mut self, peer: ConnectionId) {
        if let Some(on_peer_left) = self.on_peer_left.as_mut() {
            on_peer_left(peer);
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_failure", &self.on_failure.is_some())
            .field("on_peer_left", &self.on_peer_left.is_some())
            .finish_non_exhaustive()
    }
}
