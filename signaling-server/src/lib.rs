/*!
Signaling server that pairs two peers by room identifier and relays
their `WebRTC` negotiation messages until they can talk directly.

The server never looks inside session descriptions or candidates:
`offer`, `answer` and `candidate` are passed to their `target` as received.

The [`relay`] module holds the transport independent room registry, [`one_to_one`]
binds it to a websocket and [`router`] exposes it over `HTTP`.
*/

#![allow(clippy::module_name_repetitions)]
#![warn(
    clippy::pedantic,
    clippy::dbg_macro,
    clippy::unwrap_used,
    clippy::todo,
    clippy::unimplemented
)]
#![deny(
    clippy::wildcard_imports,
    clippy::str_to_string,
    clippy::string_to_string
)]

pub mod config;
mod error;
pub mod one_to_one;
pub mod relay;
pub mod router;

pub use error::{RelayError, Result};
