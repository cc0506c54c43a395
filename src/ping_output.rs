use std::net::Ipv4Addr;
use std::time::Duration;

/// One successful round trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PingOutput {
    pub package_size: usize,
    pub ip_addr: Ipv4Addr,
    pub identifier: u16,
    pub sequence_number: u16,
    pub ping_duration: Duration,
}
