//! Command line surface and the validated parameter set the engine consumes.
//!
//! All range checking lives here; the server and client constructors assume
//! they are handed sane values.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "udprobe",
    version,
    about = "UDP throughput probe: flood a server with datagrams and watch live packet and bit rates"
)]
pub struct Config {
    /// Run a server bound to this address.
    #[arg(
        short = 's',
        long,
        value_name = "ADDR",
        conflicts_with = "client",
        required_unless_present = "client"
    )]
    pub server: Option<IpAddr>,

    /// Run a client sending to the server at this address.
    #[arg(short = 'c', long, value_name = "ADDR")]
    pub client: Option<IpAddr>,

    /// Server port.
    #[arg(short = 'p', long, default_value_t = 40009)]
    pub port: u16,

    /// Datagram size budget in bytes; payloads are 28 bytes smaller.
    #[arg(
        short = 'M',
        long,
        default_value_t = 1300,
        value_parser = clap::value_parser!(u16).range(50..=1500)
    )]
    pub mtu: u16,

    /// Number of parallel tx/rx worker pairs.
    #[arg(
        short = 'P',
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u16).range(1..=100)
    )]
    pub parallel: u16,

    /// Stop after this many seconds (decimals allowed); runs until
    /// interrupted when absent.
    #[arg(short = 't', long, value_name = "SECONDS", value_parser = parse_session_time)]
    pub time: Option<Duration>,

    /// Acknowledge every packet by echoing its text prefix back to the
    /// sender (server only). Clients neither wait for lost acks nor check
    /// their content.
    #[arg(long)]
    pub ack: bool,
}

/// Which side to run, with the resolved socket address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server(SocketAddr),
    Client(SocketAddr),
}

impl Config {
    pub fn role(&self) -> Role {
        match (self.server, self.client) {
            (Some(ip), _) => Role::Server(SocketAddr::new(ip, self.port)),
            (None, Some(ip)) => Role::Client(SocketAddr::new(ip, self.port)),
            (None, None) => unreachable!("clap requires one of --server/--client"),
        }
    }
}

fn parse_session_time(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|e| format!("invalid seconds value: {e}"))?;
    if secs <= 0.0 || secs > 3600.0 {
        return Err(String::from("expected 0 < seconds <= 3600"));
    }
    Ok(Duration::from_secs_f64(secs))
}
