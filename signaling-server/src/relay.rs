/*!
Room registry and message relay, independent of the websocket transport.

Every live connection owns an outbox, an unbounded channel of [`SignalMessage`]s
drained by whatever transport wraps the connection. Mutations of a room run while
holding that room's entry in the registry, so two peers racing to join the same
room identifier are serialized, while unrelated rooms proceed independently.
When both maps are needed, the room entry is always taken before a connection entry.
*/

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use rendezvous_protocol::{ConnectionId, RoomId, SignalMessage};
use tokio::sync::mpsc;

use crate::error::RelayError;

/// A room pairs exactly this many peers.
pub const ROOM_CAPACITY: usize = 2;

pub type Outbox = mpsc::UnboundedSender<SignalMessage>;

/// Members of one room in the order they joined.
#[derive(Debug)]
pub struct Room {
    members: Vec<ConnectionId>,
}

impl Room {
    fn new(first: ConnectionId) -> Self {
        Self {
            members: vec![first],
        }
    }

    #[must_use]
    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.members.len() >= ROOM_CAPACITY
    }

    fn remove(&mut self, id: &ConnectionId) {
        self.members.retain(|member| member != id);
    }
}

#[derive(Debug)]
struct Member {
    outbox: Outbox,
    room: Option<RoomId>,
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Room was created, the peer waits for someone else to join
    Waiting,
    /// Room already had a waiting peer, both were notified
    Paired { peer: ConnectionId },
}

#[derive(Debug, Default)]
pub struct Relay {
    connections: DashMap<ConnectionId, Member>,
    rooms: DashMap<RoomId, Room>,
}

impl Relay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection. The first message in its outbox is a `welcome`
    /// carrying the identity assigned here.
    pub fn connect(&self, outbox: Outbox) -> ConnectionId {
        let id = ConnectionId::random();
        if outbox
            .send(SignalMessage::Welcome { id: id.clone() })
            .is_err()
        {
            debug!("user {} went away before it was welcomed", id);
        }
        self.connections
            .insert(id.clone(), Member { outbox, room: None });
        info!("new user connected: {}", id);
        id
    }

    /// Place `id` in `room_id`.
    ///
    /// The first peer creates the room and waits. The second one receives `peer-present`
    /// while the waiting peer receives `peer-joined`. Any further peer is turned away
    /// and the room is left untouched.
    ///
    /// # Errors
    /// - [`RelayError::ProtocolViolation`] for an empty room id, an unknown connection
    ///   or a connection that already is in a room,
    /// - [`RelayError::RoomFull`] when the room already has two members.
    pub fn join(&self, id: &ConnectionId, room_id: RoomId) -> Result<JoinOutcome, RelayError> {
        if room_id.is_empty() {
            return Err(RelayError::violation("room id must not be empty"));
        }
        {
            let member = self
                .connections
                .get(id)
                .ok_or_else(|| RelayError::violation(format!("unknown connection {id}")))?;
            if let Some(current) = &member.room {
                return Err(RelayError::violation(format!(
                    "{id} already joined room {current}"
                )));
            }
        }

        match self.rooms.entry(room_id.clone()) {
            // on first user in room - create room and let the user wait
            Entry::Vacant(entry) => {
                entry.insert(Room::new(id.clone()));
                self.assign_room(id, &room_id);
                info!("user {} created room {}", id, room_id);
                Ok(JoinOutcome::Waiting)
            }
            // on second user - add him to the room and notify both users
            Entry::Occupied(mut entry) => {
                let room = entry.get_mut();
                if room.is_full() {
                    warn!("user {} tried to join full room {}", id, room_id);
                    return Err(RelayError::RoomFull(room_id));
                }
                room.members.push(id.clone());
                self.assign_room(id, &room_id);

                let Some(peer) = room.members.first().filter(|first| *first != id).cloned()
                else {
                    return Ok(JoinOutcome::Waiting);
                };
                info!("user {} joined room {} with {}", id, room_id, peer);
                self.notify(id, SignalMessage::PeerPresent { peer: peer.clone() });
                self.notify(&peer, SignalMessage::PeerJoined { peer: id.clone() });
                Ok(JoinOutcome::Paired { peer })
            }
        }
    }

    /// Pass an `offer`, `answer` or `candidate` to its target without changing anything.
    ///
    /// # Errors
    /// - [`RelayError::TargetUnreachable`] when the target is not connected (anymore),
    /// - [`RelayError::ProtocolViolation`] for a message that has no target.
    pub fn relay(&self, sender: &ConnectionId, message: SignalMessage) -> Result<(), RelayError> {
        let Some(target) = message.target().cloned() else {
            return Err(RelayError::violation(format!(
                "{} cannot be relayed",
                message.tag()
            )));
        };
        debug!("relaying {} from {} to {}", message.tag(), sender, target);
        self.deliver(&target, message)
    }

    /// Forget `id`, remove it from its room and tell the remaining peer that it left.
    /// A room left without members is removed, so the next join creates it anew.
    pub fn disconnect(&self, id: &ConnectionId) {
        let Some((_, member)) = self.connections.remove(id) else {
            return;
        };
        info!("user disconnected: {}", id);
        let Some(room_id) = member.room else {
            return;
        };

        if let Entry::Occupied(mut entry) = self.rooms.entry(room_id) {
            entry.get_mut().remove(id);
            if entry.get().members.is_empty() {
                let (room_id, _) = entry.remove_entry();
                info!("room {} is empty, removing it", room_id);
            } else {
                for peer in entry.get().members() {
                    self.notify(peer, SignalMessage::PeerLeft { peer: id.clone() });
                }
            }
        }
    }

    /// Act on one message received from `sender`.
    /// Failures never propagate: they are logged and, where it helps, reported back.
    pub fn handle(&self, sender: &ConnectionId, message: SignalMessage) {
        let result = match message {
            SignalMessage::Join { room } => self.join(sender, room).map(|_| ()),
            message @ (SignalMessage::Offer { .. }
            | SignalMessage::Answer { .. }
            | SignalMessage::Candidate { .. }) => self.relay(sender, message),
            other => Err(RelayError::violation(format!(
                "{} is only sent by the signaling server",
                other.tag()
            ))),
        };
        if let Err(err) = result {
            self.reject(sender, &err);
        }
    }

    /// Log a refused message and report it to its sender when appropriate.
    pub fn reject(&self, sender: &ConnectionId, err: &RelayError) {
        if err.is_reported() {
            warn!("rejected message from {}: {}", sender, err);
            self.notify(
                sender,
                SignalMessage::Error {
                    kind: err.kind(),
                    message: err.to_string(),
                },
            );
        } else {
            warn!("dropped message from {}: {}", sender, err);
        }
    }

    #[must_use]
    pub fn room_members(&self, room_id: &RoomId) -> Option<Vec<ConnectionId>> {
        self.rooms.get(room_id).map(|room| room.members.clone())
    }

    #[must_use]
    pub fn room_of(&self, id: &ConnectionId) -> Option<RoomId> {
        self.connections
            .get(id)
            .and_then(|member| member.room.clone())
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn assign_room(&self, id: &ConnectionId, room_id: &RoomId) {
        if let Some(mut member) = self.connections.get_mut(id) {
            member.room = Some(room_id.clone());
        }
    }

    fn deliver(&self, target: &ConnectionId, message: SignalMessage) -> Result<(), RelayError> {
        let member = self
            .connections
            .get(target)
            .ok_or_else(|| RelayError::TargetUnreachable(target.clone()))?;
        member
            .outbox
            .send(message)
            .map_err(|_closed| RelayError::TargetUnreachable(target.clone()))
    }

    fn notify(&self, id: &ConnectionId, message: SignalMessage) {
        if let Err(err) = self.deliver(id, message) {
            warn!("failed to notify {}: {}", id, err);
        }
    }
}
