use super::SequenceNumber;
use super::Socket;
use pnet_packet::icmp::{
    echo_reply::EchoReplyPacket,
    echo_request::{EchoRequestPacket, MutableEchoRequestPacket},
    IcmpCode, IcmpPacket, IcmpTypes,
};
use pnet_packet::Packet;
use rand::Rng;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

pub const PAYLOAD_SIZE: usize = 56;

/// A parsed `ICMPv4` echo reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EchoReply {
    pub identifier: u16,
    pub sequence_number: u16,
    pub payload: Vec<u8>,
    pub package_size: usize,
    pub receive_time: Instant,
}

/// The socket handle shared by one `Listener` and any number of `Pinger`s.
pub struct IcmpV4<S> {
    payload: [u8; PAYLOAD_SIZE],
    socket: S,
    reader_claimed: AtomicBool,
}

impl<S> IcmpV4<S>
where
    S: Socket + 'static,
{
    pub fn new(socket: S) -> IcmpV4<S> {
        let mut payload = [0u8; PAYLOAD_SIZE];
        rand::thread_rng().fill(&mut payload[..]);
        IcmpV4 {
            payload,
            socket,
            reader_claimed: AtomicBool::new(false),
        }
    }

    /// Sends one echo request and returns the time just before the send.
    pub(crate) fn send_echo_request(
        &self,
        ipv4: Ipv4Addr,
        identifier: u16,
        sequence_number: SequenceNumber,
    ) -> Result<Instant, io::Error> {
        let package = new_echo_request(identifier, sequence_number, &self.payload)
            .ok_or_else(|| io::Error::other("could not create ICMP package"))?;

        let addr: socket2::SockAddr = SocketAddr::V4(SocketAddrV4::new(ipv4, 0)).into();
        let start_time = Instant::now();
        self.socket.send_to(package.packet(), &addr)?;
        tracing::trace!(
            %ipv4,
            identifier,
            sequence_number = u16::from(sequence_number),
            "echo request sent"
        );
        Ok(start_time)
    }

    /// Reads one message into `buf`. `Ok(None)` means the read timed out or was interrupted.
    pub(crate) fn try_receive(
        &self,
        buf: &mut [u8],
    ) -> Result<Option<(usize, Ipv4Addr, Instant)>, io::Error> {
        match self.socket.recv_from(buf) {
            Err(e) if is_retryable(&e) => Ok(None),
            Err(e) => Err(e),
            Ok((package_size, ip_addr)) => Ok(Some((package_size, ip_addr, Instant::now()))),
        }
    }

    /// Marks the read side as taken. Returns false if it already was.
    pub(crate) fn claim_reader(&self) -> bool {
        self.reader_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_reader(&self) {
        self.reader_claimed.store(false, Ordering::Release);
    }
}

fn is_retryable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

pub(crate) fn new_echo_request(
    identifier: u16,
    sequence_number: SequenceNumber,
    payload: &[u8],
) -> Option<MutableEchoRequestPacket<'static>> {
    let buf = vec![0u8; EchoRequestPacket::minimum_packet_size() + payload.len()];
    let mut package = MutableEchoRequestPacket::owned(buf)?;
    package.set_icmp_type(IcmpTypes::EchoRequest);
    package.set_icmp_code(IcmpCode::new(0));
    package.set_identifier(identifier);
    package.set_sequence_number(sequence_number.into());
    package.set_payload(payload);

    package.set_checksum(0_u16);
    let checksum = pnet_packet::icmp::checksum(&IcmpPacket::new(package.packet())?);
    package.set_checksum(checksum);
    Some(package)
}

/// Parses `buf` as an `ICMPv4` message. Anything but a well-formed echo reply yields `None`.
pub(crate) fn parse_echo_reply(buf: &[u8], receive_time: Instant) -> Option<EchoReply> {
    let icmp_packet = IcmpPacket::new(buf)?;
    if icmp_packet.get_icmp_type() != IcmpTypes::EchoReply {
        return None;
    }
    let echo_reply = EchoReplyPacket::new(buf)?;
    Some(EchoReply {
        identifier: echo_reply.get_identifier(),
        sequence_number: echo_reply.get_sequence_number(),
        payload: echo_reply.payload().to_vec(),
        package_size: buf.len(),
        receive_time,
    })
}
