use std::io;
use std::net::Ipv4Addr;

pub(crate) mod raw_socket;

/// The transport shared by the listener (reads) and all pingers (writes).
///
/// `send_to` may be called from many threads at once. `recv_from` returns the ICMP message
/// without any IP header, and should return an error of kind `WouldBlock` or `TimedOut`
/// when no packet arrived within the socket's read timeout.
pub trait Socket: Send + Sync {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize>;
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Ipv4Addr)>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::net::IpAddr;
    use std::sync::{Arc, Condvar, Mutex};
    use std::time::Duration;

    use pnet_packet::icmp::{checksum, IcmpPacket, IcmpTypes, MutableIcmpPacket};
    use pnet_packet::Packet;

    #[derive(Clone, Copy, PartialEq, Eq)]
    pub(crate) enum OnSend {
        ReturnErr,
        // Answer every echo request with the matching echo reply.
        Echo,
        // Accept the packet but never answer.
        Swallow,
    }

    type VecOfBuffersAndAddresses = Arc<Mutex<Vec<(Vec<u8>, IpAddr)>>>;
    type Inbox = Arc<(Mutex<VecDeque<io::Result<(Vec<u8>, Ipv4Addr)>>>, Condvar)>;

    pub(crate) struct SocketMock {
        on_send: Arc<Mutex<OnSend>>,
        sent: VecOfBuffersAndAddresses,
        inbox: Inbox,
        read_timeout: Duration,
    }

    impl Clone for SocketMock {
        fn clone(&self) -> Self {
            SocketMock {
                on_send: self.on_send.clone(),
                sent: self.sent.clone(),
                inbox: self.inbox.clone(),
                read_timeout: self.read_timeout,
            }
        }
    }

    impl SocketMock {
        pub(crate) fn new(on_send: OnSend) -> Self {
            Self {
                on_send: Arc::new(Mutex::new(on_send)),
                sent: Arc::new(Mutex::new(vec![])),
                inbox: Arc::new((Mutex::new(VecDeque::new()), Condvar::new())),
                read_timeout: Duration::from_millis(20),
            }
        }

        pub(crate) fn set_on_send(&self, on_send: OnSend) {
            *self.on_send.lock().unwrap() = on_send;
        }

        /// Queue a raw ICMP message for the reader.
        pub(crate) fn inject(&self, buf: &[u8], from: Ipv4Addr) {
            self.push(Ok((buf.to_vec(), from)));
        }

        /// Make the next read fail with `kind`.
        pub(crate) fn inject_error(&self, kind: io::ErrorKind) {
            self.push(Err(io::Error::new(kind, "simulating read error in mock")));
        }

        fn push(&self, item: io::Result<(Vec<u8>, Ipv4Addr)>) {
            let (queue, cvar) = &*self.inbox;
            queue.lock().unwrap().push_back(item);
            cvar.notify_one();
        }

        pub(crate) fn sent_packets(&self) -> Vec<(Vec<u8>, IpAddr)> {
            self.sent.lock().unwrap().clone()
        }

        pub(crate) fn should_send_number_of_messages(&self, n: usize) -> &Self {
            assert!(n == self.sent.lock().unwrap().len());
            self
        }

        pub(crate) fn should_send_to_address(&self, addr: &IpAddr) -> &Self {
            assert!(self.sent.lock().unwrap().iter().any(|e| *addr == e.1));
            self
        }
    }

    /// Turns an echo request into the reply a remote host would send back.
    pub(crate) fn echo_reply_for(request: &[u8]) -> Option<Vec<u8>> {
        let mut reply = request.to_vec();
        let mut package = MutableIcmpPacket::new(&mut reply)?;
        if package.get_icmp_type() != IcmpTypes::EchoRequest {
            return None;
        }
        package.set_icmp_type(IcmpTypes::EchoReply);
        package.set_checksum(0_u16);
        let checksum = checksum(&IcmpPacket::new(package.packet())?);
        package.set_checksum(checksum);
        Some(reply)
    }

    impl Socket for SocketMock {
        fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
            let on_send = *self.on_send.lock().unwrap();
            if on_send == OnSend::ReturnErr {
                return Err(io::Error::other("simulating error in mock"));
            }
            let target = addr
                .as_socket_ipv4()
                .ok_or_else(|| io::Error::other("could not extract IPv4 address"))?;
            self.sent
                .lock()
                .unwrap()
                .push((buf.to_vec(), IpAddr::V4(*target.ip())));
            if on_send == OnSend::Echo {
                if let Some(reply) = echo_reply_for(buf) {
                    self.inject(&reply, *target.ip());
                }
            }
            Ok(buf.len())
        }

        fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Ipv4Addr)> {
            let (queue, cvar) = &*self.inbox;
            let guard = queue.lock().unwrap();
            let (mut guard, _) = cvar
                .wait_timeout_while(guard, self.read_timeout, |q| q.is_empty())
                .unwrap();
            match guard.pop_front() {
                None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
                Some(Err(e)) => Err(e),
                Some(Ok((bytes, from))) => {
                    if buf.len() < bytes.len() {
                        return Err(io::Error::other("buffer too small"));
                    }
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok((bytes.len(), from))
                }
            }
        }
    }
}
