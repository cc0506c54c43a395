use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use ping_demux::{GenericError, IcmpV4, Listener, Pinger, PingerRegistry, RawSocket};

const USAGE: &str = "
Usage:
	cli host [host [host [...]]]
Example:
	cli example.com iana.org
";

#[derive(argh::FromArgs)]
/// ping - send ICMP ECHO_REQUEST to several hosts over one raw socket
struct Args {
    #[argh(option, short = 'i', default = "1000")]
    /// milliseconds between rounds
    interval: u64,

    #[argh(option, short = 'W', default = "10000")]
    /// milliseconds to wait for each reply
    timeout: u64,

    #[argh(option, short = 'c')]
    /// stop after <count> rounds
    count: Option<u32>,

    #[argh(positional)]
    /// host names or IPv4 addresses
    hosts: Vec<String>,
}

fn resolve_v4(host: &str) -> Result<Ipv4Addr, GenericError> {
    (host, 0)
        .to_socket_addrs()?
        .find_map(|addr| match addr {
            SocketAddr::V4(addr) => Some(*addr.ip()),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| format!("no IPv4 address for {host}").into())
}

fn ping_once(pinger: &Pinger<RawSocket>) {
    match pinger.probe() {
        Ok(output) => println!(
            "{} bytes from {}: icmp_seq={} time={:?}",
            output.package_size, output.ip_addr, output.sequence_number, output.ping_duration
        ),
        Err(e) => println!("{e}"),
    }
}

fn main() -> Result<(), GenericError> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let args: Args = argh::from_env();
    if args.hosts.is_empty() {
        print!("{USAGE}");
        return Ok(());
    }

    let socket = RawSocket::new(Duration::from_millis(200))?;
    let icmpv4 = Arc::new(IcmpV4::new(socket));
    let mut registry = PingerRegistry::new(icmpv4.clone());
    let timeout = Some(Duration::from_millis(args.timeout));
    for host in &args.hosts {
        let ip = resolve_v4(host)?;
        let pinger = registry.add(ip, timeout)?;
        tracing::debug!(%host, %ip, identifier = pinger.identifier(), "resolved");
    }
    let registry = Arc::new(registry);

    let routing = registry.clone();
    let listener = Listener::new(icmpv4)?.spawn(move |addr, reply| {
        routing.route(addr, reply);
    });

    let mut workers: Vec<JoinHandle<()>> = Vec::new();
    let mut round = 0;
    while !args.count.is_some_and(|count| round >= count) && !listener.is_finished() {
        for pinger in registry.pingers() {
            let pinger = pinger.clone();
            workers.push(std::thread::spawn(move || ping_once(&pinger)));
        }
        workers.retain(|worker| !worker.is_finished());
        round += 1;
        std::thread::sleep(Duration::from_millis(args.interval));
    }

    for worker in workers {
        if worker.join().is_err() {
            tracing::warn!("ping thread panicked");
        }
    }
    if let Err(e) = listener.halt() {
        tracing::error!("listener failed: {e}");
        return Err(e.into());
    }
    Ok(())
}
