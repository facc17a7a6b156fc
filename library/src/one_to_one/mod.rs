/*!
Library module for pairing with exactly one remote peer through a rendezvous signaling server.

Both peers name the same room. The one that joins second opens the data channel and makes
the offer, the other one answers. After negotiation is stable both peers are treated equally
and can send text with [`NetworkManager::send_message`].

# Example

This example shows two peers sending `ping` and `pong` messages to each other,
`factory` being whatever creates [`PeerConnection`](crate::PeerConnection)s on your stack.

```ignore
use rendezvous_peers::one_to_one::{Callbacks, NetworkManager};
use rendezvous_peers::get_random_room_id;

const SIGNALING_SERVER_URL: &str = "ws://127.0.0.1:9001/one-to-one";

let room_id = get_random_room_id();
let peer1 = NetworkManager::new(SIGNALING_SERVER_URL, room_id.clone());
let peer1_clone = peer1.clone();
let peer1_callbacks = Callbacks::new(
    move || peer1_clone.send_message("ping!").unwrap(),
    |message, received_at| println!("peer1 received message at {received_at:?}: {message}"),
);
peer1.start(factory.clone(), peer1_callbacks).await?;

let peer2 = NetworkManager::new(SIGNALING_SERVER_URL, room_id);
let peer2_clone = peer2.clone();
let peer2_callbacks = Callbacks::new(
    || { /* do nothing */ },
    move |message, _| {
        println!("peer2 received message: {message}");
        peer2_clone.send_message("pong!").unwrap();
    },
);
peer2.start(factory, peer2_callbacks).await?;
```
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::Stream;
use log::debug;
use rendezvous_protocol::{RoomId, SignalMessage};
use tokio::sync::mpsc;

pub use crate::one_to_one::callbacks::Callbacks;
use crate::connection::ConnectionFactory;
use crate::error::{Error, Result};
use crate::one_to_one::websocket_handler::{Command, Session};
use crate::utils::SessionConfig;

mod callbacks;
mod websocket;
mod websocket_handler;

#[derive(Debug)]
struct NetworkManagerInner {
    signaling_server_url: String,
    room_id: RoomId,
    config: SessionConfig,
    commands: mpsc::UnboundedSender<Command>,
    pending_commands: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    ready: Arc<AtomicBool>,
}

/// Abstraction over a peer-to-peer connection with one remote peer.
///
/// All setup is handled internally: joining the room, negotiating, trickling candidates.
/// You must only provide [`Callbacks`] for when the channel is ready and for incoming messages.
///
/// Start-up flow is divided into [`NetworkManager::new`] and [`NetworkManager::start`]
/// to allow referring to the network manager itself from the callbacks.
///
/// This type is a pointer to the underlying session and can be cloned freely.
#[derive(Debug, Clone)]
pub struct NetworkManager {
    inner: Arc<NetworkManagerInner>,
}

impl NetworkManager {
    /// Requires an address of a signaling server instance and the room
    /// by which the pair of peers identifies itself.
    #[must_use]
    pub fn new(signaling_server_url: &str, room_id: RoomId) -> Self {
        Self::with_config(signaling_server_url, room_id, SessionConfig::default())
    }

    /// Like [`NetworkManager::new`], with a non-default negotiation timeout or channel label.
    #[must_use]
    pub fn with_config(signaling_server_url: &str, room_id: RoomId, config: SessionConfig) -> Self {
        let (commands, pending_commands) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(NetworkManagerInner {
                signaling_server_url: signaling_server_url.to_owned(),
                room_id,
                config,
                commands,
                pending_commands: Mutex::new(Some(pending_commands)),
                ready: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Second part of the setup that connects to the signaling server and begins pairing.
    /// The session runs on a background task until [`NetworkManager::close`] is called
    /// or the signaling server goes away. Callbacks usually hold a clone of this manager,
    /// so dropping the handles alone does not end it.
    ///
    /// # Errors
    /// - [`Error::AlreadyStarted`] when called twice,
    /// - [`Error::Transport`] when the websocket to the signaling server cannot be opened.
    pub async fn start<F: ConnectionFactory>(&self, factory: F, callbacks: Callbacks) -> Result<()> {
        let commands = self.take_commands()?;
        match websocket::connect(&self.inner.signaling_server_url).await {
            Ok((incoming, outgoing)) => {
                self.spawn_session(commands, incoming, outgoing, factory, callbacks);
                Ok(())
            }
            Err(err) => {
                self.restore_commands(commands);
                Err(err)
            }
        }
    }

    /// Same as [`NetworkManager::start`], but over an already established signaling transport:
    /// `incoming` yields messages from the signaling server, `outgoing` takes messages for it.
    ///
    /// # Errors
    /// [`Error::AlreadyStarted`] when called twice.
    pub fn start_with_transport<S, F>(
        &self,
        incoming: S,
        outgoing: mpsc::UnboundedSender<SignalMessage>,
        factory: F,
        callbacks: Callbacks,
    ) -> Result<()>
    where
        S: Stream<Item = SignalMessage> + Send + Unpin + 'static,
        F: ConnectionFactory,
    {
        let commands = self.take_commands()?;
        self.spawn_session(commands, incoming, outgoing, factory, callbacks);
        Ok(())
    }

    /// Send text to the other end of the connection.
    ///
    /// # Errors
    /// - [`Error::ChannelNotReady`] before `on_channel_ready` fired,
    /// - [`Error::Closed`] once the session finished.
    pub fn send_message(&self, message: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::ChannelNotReady);
        }
        self.command(Command::Send(message.to_owned()))
    }

    /// Start a new offer/answer round, e.g. after a failed or timed out negotiation.
    ///
    /// # Errors
    /// [`Error::Closed`] once the session finished.
    pub fn renegotiate(&self) -> Result<()> {
        self.command(Command::Renegotiate)
    }

    /// Leave the room and close the connection with the remote peer.
    pub fn close(&self) {
        if self.command(Command::Close).is_err() {
            debug!("session in room {} already finished", self.inner.room_id);
        }
    }

    /// Whether the data channel is open and messages can be sent.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// Room this manager asked to join.
    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.inner.room_id
    }

    fn command(&self, command: Command) -> Result<()> {
        self.inner
            .commands
            .send(command)
            .map_err(|_closed| Error::Closed)
    }

    fn take_commands(&self) -> Result<mpsc::UnboundedReceiver<Command>> {
        self.inner
            .pending_commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(Error::AlreadyStarted)
    }

    fn restore_commands(&self, commands: mpsc::UnboundedReceiver<Command>) {
        *self
            .inner
            .pending_commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(commands);
    }

    fn spawn_session<S, F>(
        &self,
        commands: mpsc::UnboundedReceiver<Command>,
        incoming: S,
        outgoing: mpsc::UnboundedSender<SignalMessage>,
        factory: F,
        callbacks: Callbacks,
    ) where
        S: Stream<Item = SignalMessage> + Send + Unpin + 'static,
        F: ConnectionFactory,
    {
        let session = Session::new(
            self.inner.room_id.clone(),
            self.inner.config.clone(),
            factory,
            callbacks,
            outgoing,
            Arc::clone(&self.inner.ready),
        );
        tokio::spawn(session.run(incoming, commands));
    }
}
