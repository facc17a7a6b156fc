use rendezvous_protocol::{ConnectionId, ErrorKind, RoomId};

/// Reasons the relay refuses to act on a message.
///
/// None of them is fatal: the offending message is dropped and,
/// unless the target simply went away, the sender is told why.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("room {0} already has two peers")]
    RoomFull(RoomId),
    #[error("target {0} is not connected")]
    TargetUnreachable(ConnectionId),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl RelayError {
    pub(crate) fn violation(reason: impl Into<String>) -> Self {
        Self::ProtocolViolation(reason.into())
    }

    /// Category reported to the peer on the wire
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RoomFull(_) => ErrorKind::RoomFull,
            Self::TargetUnreachable(_) => ErrorKind::TargetUnreachable,
            Self::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
        }
    }

    /// Whether the sender gets an `error` message back.
    /// Messages for a peer that left mid-handshake are dropped silently.
    #[must_use]
    pub const fn is_reported(&self) -> bool {
        !matches!(self, Self::TargetUnreachable(_))
    }
}

pub type Result<T> = anyhow::Result<T>;
