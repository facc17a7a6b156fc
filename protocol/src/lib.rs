/*!
Helper crate that declares common types and structures shared between
[rendezvous-peers](../rendezvous_peers/index.html)
and [rendezvous-signaling-server](../rendezvous_signaling_server/index.html).
*/

#![warn(missing_docs)]

pub mod codec;
pub mod common;
pub mod one_to_one;

pub use codec::{CodecError, Encoding};
pub use common::{ConnectionId, IceCandidate, RoomId, SdpType, SessionDescription};
pub use one_to_one::{ErrorKind, SignalMessage};
