#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

//! `ICMPv4` echo over one shared raw socket.
//!
//! A [`Listener`] is the only reader of the socket and hands every echo reply to a handler.
//! Each destination gets a [`Pinger`] with its own identifier; the handler routes replies
//! to it by identifier, usually through a [`PingerRegistry`].

pub use icmp::v4::{EchoReply, IcmpV4, RawSocket, Socket, PAYLOAD_SIZE};
pub use listener::{Listener, ListenerHandle};
pub use ping_error::{GenericError, PingError, PingResult};
pub use ping_output::PingOutput;
pub use pinger::{Pinger, DEFAULT_TIMEOUT};
pub use pinger_registry::PingerRegistry;

mod icmp;
mod listener;
mod ping_error;
mod ping_output;
mod pinger;
mod pinger_registry;
