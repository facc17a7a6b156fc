/*!
Capability of the underlying peer connection object.

The negotiation logic never talks to a `WebRTC` stack directly. Anything that can produce
and apply session descriptions, accept remote candidates and carry bytes over a data channel
can be plugged in by implementing [`PeerConnection`]. Asynchronous happenings on the
connection object, like a freshly gathered local candidate, are reported back through the
[`EventSender`] handed over when the object is created.
*/

use async_trait::async_trait;
use rendezvous_protocol::{ConnectionId, IceCandidate, SessionDescription};
use tokio::sync::mpsc;

/// Something that happened on a connection object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Local changes (e.g. a new data channel) require an offer/answer round
    NegotiationNeeded,
    /// A local candidate was gathered and should be sent to the remote peer
    IceCandidate(IceCandidate),
    /// The data channel is open
    ChannelOpen,
    /// Bytes arrived over the data channel
    Message(Vec<u8>),
    /// The data channel or the connection closed
    Closed,
}

pub type EventSender = mpsc::UnboundedSender<ConnectionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

#[async_trait]
pub trait PeerConnection: Send + 'static {
    async fn create_offer(&mut self) -> anyhow::Result<SessionDescription>;

    async fn create_answer(&mut self) -> anyhow::Result<SessionDescription>;

    async fn set_local_description(&mut self, description: SessionDescription)
        -> anyhow::Result<()>;

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> anyhow::Result<()>;

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> anyhow::Result<()>;

    /// Discard the pending local offer. Called on the side that backs off when both
    /// peers sent an offer at the same time.
    async fn rollback(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn create_data_channel(&mut self, label: &str) -> anyhow::Result<()>;

    async fn send(&mut self, data: &[u8]) -> anyhow::Result<()>;

    async fn close(&mut self);
}

/// Creates a connection object for every remote peer the endpoint pairs with.
pub trait ConnectionFactory: Send + 'static {
    type Connection: PeerConnection;

    /// # Errors
    /// Fails when the underlying stack cannot create a connection object.
    fn create(
        &mut self,
        remote: &ConnectionId,
        events: EventSender,
    ) -> anyhow::Result<Self::Connection>;
}

impl<F, C> ConnectionFactory for F
where
    F: FnMut(&ConnectionId, EventSender) -> anyhow::Result<C> + Send + 'static,
    C: PeerConnection,
{
    type Connection = C;

    fn create(&mut self, remote: &ConnectionId, events: EventSender) -> anyhow::Result<C> {
        self(remote, events)
    }
}
