use rendezvous_protocol::ErrorKind;

use crate::negotiation::NegotiationState;

/// Everything that can go wrong on the endpoint side.
///
/// None of these is fatal to the process. A failed negotiation leaves the state machine in
/// [`NegotiationState::Idle`], from where [`crate::one_to_one::NetworkManager::renegotiate`]
/// or joining the room again recovers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("negotiation failed: {0:#}")]
    NegotiationFailed(anyhow::Error),
    #[error("negotiation timed out in state {0:?}")]
    NegotiationTimedOut(NegotiationState),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("signaling server rejected request ({kind:?}): {message}")]
    Rejected { kind: ErrorKind, message: String },
    #[error("data channel is not open yet")]
    ChannelNotReady,
    #[error("network manager was already started")]
    AlreadyStarted,
    #[error("session is closed")]
    Closed,
    #[error("signaling transport failed: {0:#}")]
    Transport(anyhow::Error),
}

impl Error {
    pub(crate) fn violation(reason: impl Into<String>) -> Self {
        Self::ProtocolViolation(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
