/*!
Signaling messages exchanged between peers and the signaling server
to pair two peers in a room and negotiate a direct connection between them.
 */

use serde::{Deserialize, Serialize};

use crate::common::{ConnectionId, IceCandidate, RoomId, SessionDescription};

/// Category of a failure the signaling server reports back to a peer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Room already holds two peers
    RoomFull,
    /// Message target is no longer connected
    TargetUnreachable,
    /// Malformed message or a message that is not expected from this side
    ProtocolViolation,
}

/// `Enum` consisting of two main categories: messages used to pair peers in a room
/// and messages used to setup `WebRTC` connection afterwards.
///
/// Messages of the second category carry an explicit `target`, which is all
/// the signaling server looks at when passing them on.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalMessage {
    /// Peer asks to be placed in a room
    Join {
        /// Room to join
        room: RoomId,
    },
    /// First message on every connection, tells the peer its own identity
    Welcome {
        /// Identity assigned to the receiving connection
        id: ConnectionId,
    },
    /// The other peer was already waiting in the room
    PeerPresent {
        /// Identity of the waiting peer
        peer: ConnectionId,
    },
    /// Another peer arrived in the room
    PeerJoined {
        /// Identity of the arriving peer
        peer: ConnectionId,
    },
    /// The other peer in the room disconnected
    PeerLeft {
        /// Identity of the peer that left
        peer: ConnectionId,
    },

    /// `SDP` Offer that gets passed to the other peer without modifications
    Offer {
        /// Peer the offer is meant for
        target: ConnectionId,
        /// Peer making the offer
        caller: ConnectionId,
        /// Offered description
        sdp: SessionDescription,
    },
    /// `SDP` Answer that gets passed to the other peer without modifications
    Answer {
        /// Peer the answer is meant for
        target: ConnectionId,
        /// Peer answering
        caller: ConnectionId,
        /// Answering description
        sdp: SessionDescription,
    },
    /// Proposed ICE Candidate of one peer passed to the other peer without modifications
    Candidate {
        /// Peer the candidate is meant for
        target: ConnectionId,
        /// The candidate itself
        candidate: IceCandidate,
    },

    /// Error reported by the signaling server
    Error {
        /// Category of the failure
        kind: ErrorKind,
        /// Human readable detail
        message: String,
    },
}

impl SignalMessage {
    /// Target of a message that the server relays, `None` for every other message.
    #[must_use]
    pub const fn target(&self) -> Option<&ConnectionId> {
        match self {
            Self::Offer { target, .. }
            | Self::Answer { target, .. }
            | Self::Candidate { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Wire tag of the message.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Welcome { .. } => "welcome",
            Self::PeerPresent { .. } => "peer-present",
            Self::PeerJoined { .. } => "peer-joined",
            Self::PeerLeft { .. } => "peer-left",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_target_is_only_set_on_relayed_messages() {
        let offer = SignalMessage::Offer {
            target: ConnectionId::from("b"),
            caller: ConnectionId::from("a"),
            sdp: SessionDescription::offer("v=0"),
        };
        assert_eq!(offer.target(), Some(&ConnectionId::from("b")));

        let join = SignalMessage::Join {
            room: RoomId::from("room42"),
        };
        assert_eq!(join.target(), None);
        assert_eq!(join.tag(), "join");
    }
}
