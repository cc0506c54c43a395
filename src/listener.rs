use crate::icmp::v4::{parse_echo_reply, EchoReply, IcmpV4, Socket};
use crate::{PingError, PingResult};
use std::net::Ipv4Addr;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

const RECV_BUFFER_SIZE: usize = 512;

/// The single reader of a shared ICMP socket.
///
/// Only one `Listener` can exist per socket at a time; `new` fails while another one is
/// alive. Every echo reply read from the socket is handed to the dispatch handler, all
/// other ICMP traffic is dropped.
pub struct Listener<S>
where
    S: Socket + 'static,
{
    icmpv4: Arc<IcmpV4<S>>,
}

impl<S> Listener<S>
where
    S: Socket + 'static,
{
    pub fn new(icmpv4: Arc<IcmpV4<S>>) -> PingResult<Self> {
        if !icmpv4.claim_reader() {
            return Err(PingError::message("socket already has a listener"));
        }
        Ok(Listener { icmpv4 })
    }

    /// Reads from the socket on the calling thread until a read fails.
    ///
    /// The handler runs on the reading thread, so it should return quickly.
    pub fn dispatch<F>(self, handler: F) -> PingResult<()>
    where
        F: FnMut(Ipv4Addr, EchoReply),
    {
        self.dispatch_until(handler, || false)
    }

    /// Runs `dispatch` on a dedicated thread.
    pub fn spawn<F>(self, handler: F) -> ListenerHandle
    where
        F: FnMut(Ipv4Addr, EchoReply) + Send + 'static,
    {
        let (halt_tx, halt_rx) = mpsc::channel::<()>();
        let thread = std::thread::spawn(move || {
            tracing::trace!("listener thread start");
            let should_halt = || !matches!(halt_rx.try_recv(), Err(TryRecvError::Empty));
            let result = self.dispatch_until(handler, should_halt);
            tracing::trace!("listener thread end");
            result
        });
        ListenerHandle { halt_tx, thread }
    }

    fn dispatch_until<F, H>(&self, mut handler: F, should_halt: H) -> PingResult<()>
    where
        F: FnMut(Ipv4Addr, EchoReply),
        H: Fn() -> bool,
    {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            if should_halt() {
                tracing::debug!("listener halted");
                return Ok(());
            }
            let received = match self.icmpv4.try_receive(&mut buf) {
                Ok(received) => received,
                Err(e) => {
                    tracing::error!("reading from socket failed: {e}");
                    return Err(PingError::Io(e));
                }
            };
            let Some((package_size, ip_addr, receive_time)) = received else {
                continue;
            };
            if let Some(echo_reply) = parse_echo_reply(&buf[..package_size], receive_time) {
                tracing::trace!(
                    %ip_addr,
                    identifier = echo_reply.identifier,
                    sequence_number = echo_reply.sequence_number,
                    "echo reply received"
                );
                handler(ip_addr, echo_reply);
            } else {
                tracing::trace!(
                    %ip_addr,
                    package_size,
                    "ignoring packet that is not an echo reply"
                );
            }
        }
    }
}

impl<S> Drop for Listener<S>
where
    S: Socket + 'static,
{
    fn drop(&mut self) {
        self.icmpv4.release_reader();
    }
}

/// Controls a listener running on its own thread.
pub struct ListenerHandle {
    halt_tx: mpsc::Sender<()>,
    thread: JoinHandle<PingResult<()>>,
}

impl ListenerHandle {
    /// True once the dispatch loop has ended, e.g. because the socket failed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Stops the dispatch loop and returns how it ended.
    pub fn halt(self) -> PingResult<()> {
        // mpsc::Sender::send() returns error only if the loop has already ended.
        let _maybe_err = self.halt_tx.send(());
        self.thread
            .join()
            .map_err(|_| PingError::message("listener thread panicked"))?
    }
}
