mod icmpv4;
pub(crate) use icmpv4::parse_echo_reply;
pub use icmpv4::{EchoReply, IcmpV4, PAYLOAD_SIZE};
#[cfg(test)]
pub(crate) use icmpv4::new_echo_request;

mod sequence_number;
pub(crate) use sequence_number::SequenceNumber;

mod socket;
pub use socket::raw_socket::RawSocket;
pub use socket::Socket;

#[cfg(test)]
pub(crate) use socket::tests;
