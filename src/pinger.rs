use crate::icmp::v4::{EchoReply, IcmpV4, SequenceNumber, Socket};
use crate::{PingError, PingOutput, PingResult};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::mpsc::{self, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

type ReplySender = mpsc::SyncSender<EchoReply>;
type ReplyReceiver = mpsc::Receiver<EchoReply>;

struct Outstanding {
    next_sequence_number: SequenceNumber,
    slots: HashMap<SequenceNumber, ReplySender>,
}

/// Sends echo requests to one destination and matches the replies the listener hands over.
///
/// All pingers sharing a socket need distinct identifiers. `probe` may be called from
/// several threads at once; every call gets its own sequence number.
pub struct Pinger<S> {
    icmpv4: Arc<IcmpV4<S>>,
    addr: Ipv4Addr,
    identifier: u16,
    timeout: Duration,
    outstanding: Mutex<Outstanding>,
}

impl<S> Pinger<S>
where
    S: Socket + 'static,
{
    pub fn new(
        icmpv4: Arc<IcmpV4<S>>,
        addr: Ipv4Addr,
        identifier: u16,
        timeout: Option<Duration>,
    ) -> Self {
        Pinger {
            icmpv4,
            addr,
            identifier,
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
            outstanding: Mutex::new(Outstanding {
                next_sequence_number: SequenceNumber::start_value(),
                slots: HashMap::new(),
            }),
        }
    }

    #[must_use]
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    #[must_use]
    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn probe(&self) -> PingResult<PingOutput> {
        self.probe_with_timeout(self.timeout)
    }

    /// Sends one echo request and blocks until its reply arrives or `timeout` elapses.
    pub fn probe_with_timeout(&self, timeout: Duration) -> PingResult<PingOutput> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let sequence_number = self.register(reply_tx)?;
        let result = self.send_and_wait(sequence_number, &reply_rx, timeout);
        self.retire(sequence_number);
        result
    }

    fn send_and_wait(
        &self,
        sequence_number: SequenceNumber,
        reply_rx: &ReplyReceiver,
        timeout: Duration,
    ) -> PingResult<PingOutput> {
        let start_time = self
            .icmpv4
            .send_echo_request(self.addr, self.identifier, sequence_number)
            .map_err(|source| PingError::Send {
                addr: self.addr,
                sequence_number: sequence_number.into(),
                source,
            })?;

        // The sender stays in the map until `retire`, so the channel cannot disconnect here.
        if let Ok(reply) = reply_rx.recv_timeout(timeout) {
            Ok(PingOutput {
                package_size: reply.package_size,
                ip_addr: self.addr,
                identifier: self.identifier,
                sequence_number: reply.sequence_number,
                ping_duration: reply.receive_time.saturating_duration_since(start_time),
            })
        } else {
            tracing::debug!(
                addr = %self.addr,
                sequence_number = u16::from(sequence_number),
                "timeout"
            );
            Err(PingError::Timeout {
                addr: self.addr,
                sequence_number: sequence_number.into(),
            })
        }
    }

    /// Hands a reply carrying this pinger's identifier to the waiting probe.
    ///
    /// Never blocks. Returns false if nobody is waiting for the reply's sequence number
    /// (the probe timed out, the reply is a duplicate, or it was never sent by us).
    pub fn accept(&self, reply: EchoReply) -> bool {
        let sequence_number = SequenceNumber::from(reply.sequence_number);
        let reply_tx = self.lock().slots.get(&sequence_number).cloned();
        let Some(reply_tx) = reply_tx else {
            tracing::trace!(
                identifier = self.identifier,
                sequence_number = reply.sequence_number,
                "no request waiting for reply"
            );
            return false;
        };
        match reply_tx.try_send(reply) {
            Ok(()) => true,
            Err(TrySendError::Full(reply)) => {
                tracing::debug!(
                    identifier = self.identifier,
                    sequence_number = reply.sequence_number,
                    "dropping duplicate reply"
                );
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    fn register(&self, reply_tx: ReplySender) -> PingResult<SequenceNumber> {
        let mut outstanding = self.lock();
        if outstanding.slots.len() > usize::from(u16::MAX) {
            return Err(PingError::message(format!(
                "all sequence numbers of identifier {} are in use",
                self.identifier
            )));
        }
        let mut sequence_number = outstanding.next_sequence_number;
        while outstanding.slots.contains_key(&sequence_number) {
            sequence_number = sequence_number.next();
        }
        outstanding.slots.insert(sequence_number, reply_tx);
        outstanding.next_sequence_number = sequence_number.next();
        Ok(sequence_number)
    }

    fn retire(&self, sequence_number: SequenceNumber) {
        self.lock().slots.remove(&sequence_number);
    }

    // Every critical section is a single map operation, so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, Outstanding> {
        self.outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn outstanding_count(&self) -> usize {
        self.lock().slots.len()
    }
}
