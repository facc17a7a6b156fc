use std::time::Duration;

use rendezvous_protocol::RoomId;
use uuid::Uuid;

/// How long an offer may stay unanswered before the negotiation is abandoned.
pub const DEFAULT_NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Label of the data channel opened by the initiating peer.
pub const DATA_CHANNEL_LABEL: &str = "chat";

const ROOM_ID_LENGTH: usize = 6;

/// Returns a new short room identifier that is easy to share with the other peer.
#[must_use]
pub fn get_random_room_id() -> RoomId {
    let id: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(ROOM_ID_LENGTH)
        .collect();
    RoomId::new(id)
}

/// Tunables of a single endpoint session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub negotiation_timeout: Duration,
    pub data_channel_label: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            negotiation_timeout: DEFAULT_NEGOTIATION_TIMEOUT,
            data_channel_label: DATA_CHANNEL_LABEL.to_owned(),
        }
    }
}
