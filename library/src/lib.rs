/*!
This crate provides the endpoint side of a rendezvous signaling service for peer to peer connections.

# Overview

Two peers that want to talk directly first have to exchange session descriptions and
network candidates. This library does it for you through an instance of the
[accompanying signaling server](../rendezvous_signaling_server/index.html): both peers name
the same room, the server pairs them, and the offer/answer round runs on its own.
You only provide the connection object capability ([`PeerConnection`]) and two callbacks,
one for when the data channel is ready and one for when a message is received.

The negotiation itself lives in [`negotiation`], the session glue in [`one_to_one`].
*/

#![allow(clippy::module_name_repetitions)]
// clippy WARN level lints
#![warn(
    clippy::cargo,
    clippy::pedantic,
    clippy::dbg_macro,
    clippy::unwrap_used,
    clippy::integer_division,
    clippy::large_include_file,
    clippy::map_err_ignore,
    clippy::panic,
    clippy::todo,
    clippy::undocumented_unsafe_blocks,
    clippy::unimplemented,
    clippy::unreachable
)]
// clippy WARN level lints, that can be upgraded to DENY if preferred
#![warn(
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::empty_structs_with_brackets,
    clippy::exit,
    clippy::if_then_some_else_none,
    clippy::indexing_slicing,
    clippy::let_underscore_must_use,
    clippy::string_slice,
    clippy::try_err
)]
// clippy DENY level lints, they always have a quick fix that should be preferred
#![deny(
    clippy::wildcard_imports,
    clippy::multiple_inherent_impl,
    clippy::rc_buffer,
    clippy::rc_mutex,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_name_method,
    clippy::self_named_module_files,
    clippy::shadow_unrelated,
    clippy::str_to_string,
    clippy::string_add,
    clippy::string_to_string,
    clippy::unnecessary_self_imports,
    clippy::unneeded_field_pattern,
    clippy::verbose_file_reads
)]

mod connection;
mod error;
pub mod negotiation;
pub mod one_to_one;
mod utils;

pub use connection::{
    ConnectionEvent, ConnectionFactory, EventReceiver, EventSender, PeerConnection,
};
pub use error::{Error, Result};
pub use negotiation::{NegotiationState, Negotiator};
pub use rendezvous_protocol::{ConnectionId, IceCandidate, RoomId, SdpType, SessionDescription};
pub use utils::{get_random_room_id, SessionConfig, DATA_CHANNEL_LABEL, DEFAULT_NEGOTIATION_TIMEOUT};
