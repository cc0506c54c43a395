use super::Socket;
use pnet_packet::{ipv4::Ipv4Packet, Packet};
use socket2::{Domain, Protocol, Type};
use std::net::Ipv4Addr;
use std::{io, time::Duration};

const RECV_BUFFER_SIZE: usize = 1500;

/// A privileged `SOCK_RAW` `ICMPv4` socket.
pub struct RawSocket {
    socket: socket2::Socket,
}

impl RawSocket {
    /// Opens the socket. `read_timeout` bounds how long a single read may block, which is
    /// how often a listener gets to notice that it should stop.
    pub fn new(read_timeout: Duration) -> Result<Self, io::Error> {
        tracing::trace!("creating RawSocket");
        let socket = socket2::Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
        socket.set_read_timeout(Some(read_timeout))?;
        Ok(RawSocket { socket })
    }
}

impl Socket for RawSocket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Ipv4Addr)> {
        let mut recv_buf = [0u8; RECV_BUFFER_SIZE];

        // Socket2 gives a safety guaranty which allows us to do an unsafe cast from `&mut [u8]`
        // to `&mut [std::mem::MaybeUninit<u8>]`.
        // https://docs.rs/socket2/0.4.7/socket2/struct.Socket.html#method.recv
        //
        // On a RAW socket we get an IP packet.
        let (n_bytes, socket_addr) = socket2::Socket::recv_from(&self.socket, unsafe {
            &mut *(std::ptr::addr_of_mut!(recv_buf) as *mut [u8]
                as *mut [std::mem::MaybeUninit<u8>])
        })?;
        let ip = socket_addr
            .as_socket_ipv4()
            .map(|addr| *addr.ip())
            .ok_or_else(|| io::Error::other("received from non-IPv4 address"))?;

        // A truncated IP header yields an empty message, which the listener discards.
        let ip_payload = match Ipv4Packet::new(&recv_buf[..n_bytes]) {
            Some(ipv4_packet) if usize::from(ipv4_packet.get_header_length()) * 4 <= n_bytes => {
                ipv4_packet.payload().to_vec()
            }
            _ => Vec::new(),
        };
        // Return only the ICMP content
        let len = ip_payload.len().min(buf.len());
        buf[..len].copy_from_slice(&ip_payload[..len]);
        Ok((len, ip))
    }
}
