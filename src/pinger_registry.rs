use crate::icmp::v4::{EchoReply, IcmpV4, Socket};
use crate::{PingError, PingResult, Pinger};
use rand::Rng;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

/// The set of pingers sharing one socket, keyed by their endpoint identifier.
///
/// Build it up front, then share it (e.g. in an `Arc`) with the listener's dispatch handler
/// and the threads calling `probe`.
pub struct PingerRegistry<S> {
    icmpv4: Arc<IcmpV4<S>>,
    pingers: HashMap<u16, Arc<Pinger<S>>>,
}

impl<S> PingerRegistry<S>
where
    S: Socket + 'static,
{
    pub fn new(icmpv4: Arc<IcmpV4<S>>) -> Self {
        PingerRegistry {
            icmpv4,
            pingers: HashMap::new(),
        }
    }

    /// Creates a pinger for `addr` with a random identifier not yet used in this registry.
    pub fn add(
        &mut self,
        addr: Ipv4Addr,
        timeout: Option<Duration>,
    ) -> PingResult<Arc<Pinger<S>>> {
        if self.pingers.len() > usize::from(u16::MAX) {
            return Err(PingError::message("all identifiers are in use"));
        }
        let mut rng = rand::thread_rng();
        let identifier = loop {
            let candidate: u16 = rng.gen();
            if !self.pingers.contains_key(&candidate) {
                break candidate;
            }
        };
        let pinger = Pinger::new(self.icmpv4.clone(), addr, identifier, timeout);
        let pinger = Arc::new(pinger);
        self.pingers.insert(identifier, pinger.clone());
        tracing::debug!(%addr, identifier, "pinger added");
        Ok(pinger)
    }

    /// Registers a pinger built with a caller-chosen identifier.
    pub fn insert(&mut self, pinger: Pinger<S>) -> PingResult<Arc<Pinger<S>>> {
        let identifier = pinger.identifier();
        if self.pingers.contains_key(&identifier) {
            let message = format!("identifier {identifier} is already in use");
            return Err(PingError::message(message));
        }
        let pinger = Arc::new(pinger);
        self.pingers.insert(identifier, pinger.clone());
        Ok(pinger)
    }

    /// Hands a reply to the pinger owning its identifier. Returns whether a waiting request
    /// took it.
    pub fn route(&self, addr: Ipv4Addr, reply: EchoReply) -> bool {
        if let Some(pinger) = self.pingers.get(&reply.identifier) {
            pinger.accept(reply)
        } else {
            tracing::trace!(
                %addr,
                identifier = reply.identifier,
                "reply for unknown identifier"
            );
            false
        }
    }

    #[must_use]
    pub fn get(&self, identifier: u16) -> Option<&Arc<Pinger<S>>> {
        self.pingers.get(&identifier)
    }

    pub fn pingers(&self) -> impl Iterator<Item = &Arc<Pinger<S>>> {
        self.pingers.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pingers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pingers.is_empty()
    }
}
