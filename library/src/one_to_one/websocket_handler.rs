use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use futures_util::{Stream, StreamExt};
use log::{debug, error, info, warn};
use rendezvous_protocol::{ConnectionId, RoomId, SignalMessage};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::connection::{ConnectionEvent, ConnectionFactory, EventReceiver, PeerConnection};
use crate::error::{Error, Result};
use crate::negotiation::{NegotiationState, Negotiator};
use crate::one_to_one::callbacks::Callbacks;
use crate::utils::SessionConfig;

/// Requests from [`super::NetworkManager`] handles to the running session.
#[derive(Debug)]
pub(crate) enum Command {
    Send(String),
    Renegotiate,
    Close,
}

/// State of one endpoint: the room it asked for, its identity once the server welcomed it
/// and the negotiation with the peer it is paired with.
///
/// Everything is processed strictly one event at a time. Signals that arrive while a
/// description is being generated wait in their channel until the step is done.
pub(crate) struct Session<F: ConnectionFactory> {
    room_id: RoomId,
    config: SessionConfig,
    factory: F,
    callbacks: Callbacks,
    outgoing: mpsc::UnboundedSender<SignalMessage>,
    local_id: Option<ConnectionId>,
    negotiator: Option<Negotiator<F::Connection>>,
    events: Option<EventReceiver>,
    channel_open: bool,
    ready: Arc<AtomicBool>,
}

impl<F: ConnectionFactory> Session<F> {
    pub(crate) fn new(
        room_id: RoomId,
        config: SessionConfig,
        factory: F,
        callbacks: Callbacks,
        outgoing: mpsc::UnboundedSender<SignalMessage>,
        ready: Arc<AtomicBool>,
    ) -> Self {
        Self {
            room_id,
            config,
            factory,
            callbacks,
            outgoing,
            local_id: None,
            negotiator: None,
            events: None,
            channel_open: false,
            ready,
        }
    }

    pub(crate) async fn run<S>(mut self, mut incoming: S, mut commands: mpsc::UnboundedReceiver<Command>)
    where
        S: Stream<Item = SignalMessage> + Unpin,
    {
        let join = SignalMessage::Join {
            room: self.room_id.clone(),
        };
        if let Err(err) = signal(&self.outgoing, join) {
            self.callbacks.failure(err);
            return;
        }
        info!("asked to join room {}", self.room_id);

        loop {
            let deadline = self.negotiator.as_ref().and_then(Negotiator::deadline);
            tokio::select! {
                message = incoming.next() => {
                    let Some(message) = message else {
                        info!("signaling server closed the connection");
                        break;
                    };
                    if let Err(err) = self.handle_websocket_message(message).await {
                        self.callbacks.failure(err);
                    }
                }
                Some(event) = next_event(&mut self.events) => {
                    if let Err(err) = self.handle_connection_event(event).await {
                        self.callbacks.failure(err);
                    }
                }
                command = commands.recv() => match command {
                    Some(Command::Close) | None => break,
                    Some(command) => {
                        if let Err(err) = self.handle_command(command).await {
                            self.callbacks.failure(err);
                        }
                    }
                },
                () = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(negotiator) = self.negotiator.as_mut() {
                        let err = negotiator.expire();
                        self.callbacks.failure(err);
                    }
                }
            }
        }

        self.disconnect_peer().await;
        info!("session in room {} finished", self.room_id);
    }

    /// Basically a state spread across both peers and the signaling server,
    /// handling each step of pairing and then the negotiation.
    async fn handle_websocket_message(&mut self, message: SignalMessage) -> Result<()> {
        match message {
            SignalMessage::Welcome { id } => {
                info!("signaling server assigned id {}", id);
                self.local_id = Some(id);
            }
            SignalMessage::PeerPresent { peer } => {
                info!("peer {} is already waiting in room {}", peer, self.room_id);
                self.pair(peer, true).await?;
            }
            SignalMessage::PeerJoined { peer } => {
                info!("peer {} joined room {}", peer, self.room_id);
                self.pair(peer, false).await?;
            }
            SignalMessage::PeerLeft { peer } => {
                if self.negotiator.as_ref().map(Negotiator::remote) == Some(&peer) {
                    info!("peer {} left room {}", peer, self.room_id);
                    self.disconnect_peer().await;
                    self.callbacks.peer_left(peer);
                } else {
                    debug!("ignoring departure of unrelated peer {}", peer);
                }
            }
            SignalMessage::Offer {
                target,
                caller,
                sdp,
            } => {
                if self.local_id.as_ref() != Some(&target) {
                    warn!("received offer meant for {}", target);
                }
                if self.negotiator.is_none() {
                    self.pair(caller.clone(), false).await?;
                }
                let negotiator = self.negotiator_mut()?;
                if let Some(answer) = negotiator.on_offer(&caller, sdp).await? {
                    signal(&self.outgoing, answer)?;
                }
                self.check_ready();
            }
            SignalMessage::Answer { caller, sdp, .. } => {
                self.negotiator_mut()?.on_answer(&caller, sdp).await?;
                self.check_ready();
            }
            SignalMessage::Candidate { candidate, .. } => {
                self.negotiator_mut()?.on_remote_candidate(candidate).await;
            }
            SignalMessage::Error { kind, message } => {
                return Err(Error::Rejected { kind, message });
            }
            SignalMessage::Join { .. } => {
                return Err(Error::violation(
                    "join should only be sent by peers to the signaling server",
                ));
            }
        }
        Ok(())
    }

    async fn handle_connection_event(&mut self, event: ConnectionEvent) -> Result<()> {
        let Some(negotiator) = self.negotiator.as_mut() else {
            debug!("dropping {:?} of a closed connection", event);
            return Ok(());
        };
        match event {
            ConnectionEvent::NegotiationNeeded => {
                if let Some(offer) = negotiator.on_negotiation_needed().await? {
                    signal(&self.outgoing, offer)?;
                }
            }
            ConnectionEvent::IceCandidate(candidate) => {
                debug!("signaling local candidate: {:?}", candidate);
                signal(&self.outgoing, negotiator.local_candidate(candidate))?;
            }
            ConnectionEvent::ChannelOpen => {
                debug!("data channel with {} is open", negotiator.remote());
                self.channel_open = true;
                self.check_ready();
            }
            ConnectionEvent::Message(bytes) => {
                let message = String::from_utf8_lossy(&bytes).into_owned();
                debug!("message from data channel (will call on_message_received)");
                self.callbacks.message_received(message, SystemTime::now());
            }
            ConnectionEvent::Closed => {
                info!("data channel with {} closed", negotiator.remote());
                self.channel_open = false;
                self.ready.store(false, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Send(message) => {
                if !self.ready.load(Ordering::SeqCst) {
                    return Err(Error::ChannelNotReady);
                }
                self.negotiator_mut()?
                    .connection_mut()
                    .send(message.as_bytes())
                    .await
                    .map_err(Error::Transport)
            }
            Command::Renegotiate => {
                let negotiator = self.negotiator_mut()?;
                if let Some(offer) = negotiator.on_negotiation_needed().await? {
                    signal(&self.outgoing, offer)?;
                }
                Ok(())
            }
            Command::Close => Ok(()),
        }
    }

    /// Create a connection object for `peer`. The initiator opens the data channel,
    /// which makes the connection object ask for a negotiation.
    async fn pair(&mut self, peer: ConnectionId, initiator: bool) -> Result<()> {
        let Some(local) = self.local_id.clone() else {
            return Err(Error::violation(format!(
                "paired with {peer} before being welcomed"
            )));
        };
        self.disconnect_peer().await;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let connection = self
            .factory
            .create(&peer, events_tx)
            .map_err(Error::NegotiationFailed)?;
        let mut negotiator = Negotiator::new(
            local,
            peer,
            connection,
            self.config.negotiation_timeout,
        );
        if initiator {
            negotiator
                .connection_mut()
                .create_data_channel(&self.config.data_channel_label)
                .await
                .map_err(Error::NegotiationFailed)?;
            debug!(
                "data channel created with label: {:?}",
                self.config.data_channel_label
            );
        }
        self.negotiator = Some(negotiator);
        self.events = Some(events_rx);
        Ok(())
    }

    async fn disconnect_peer(&mut self) {
        self.events = None;
        self.channel_open = false;
        self.ready.store(false, Ordering::SeqCst);
        if let Some(negotiator) = self.negotiator.take() {
            negotiator.close().await;
        }
    }

    fn check_ready(&mut self) {
        let stable = self
            .negotiator
            .as_ref()
            .is_some_and(|negotiator| negotiator.state() == NegotiationState::Stable);
        if stable && self.channel_open && !self.ready.swap(true, Ordering::SeqCst) {
            self.callbacks.channel_ready();
        }
    }

    fn negotiator_mut(&mut self) -> Result<&mut Negotiator<F::Connection>> {
        self.negotiator
            .as_mut()
            .ok_or_else(|| Error::violation("negotiation message before pairing"))
    }
}

fn signal(outgoing: &mpsc::UnboundedSender<SignalMessage>, message: SignalMessage) -> Result<()> {
    debug!("sending {} to signaling server", message.tag());
    outgoing.send(message).map_err(|_closed| {
        error!("signaling connection is gone");
        Error::Closed
    })
}

async fn next_event(events: &mut Option<EventReceiver>) -> Option<ConnectionEvent> {
    match events.as_mut() {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}
