//! A UDP throughput probe for measuring packet and bit rates between two
//! nodes. One side runs a server that counts every datagram it receives and
//! can acknowledge each one; the other floods it from any number of
//! parallel worker pairs, printing live `pps`/`bps` reports once a second
//! for every traffic direction.
//!
//! The crate ships both a threaded engine (what the `udprobe` binary runs)
//! and an async rendition of the same loops for embedding in a tokio
//! runtime.
//!
//! # Details
//!
//! - Use [`UdpServer`] to count, report and optionally acknowledge incoming
//!   datagrams:
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use udprobe::{ProbeError, ShutdownSignal, UdpServer};
//!
//! fn main() -> Result<(), ProbeError> {
//!     let shutdown = Arc::new(ShutdownSignal::new());
//!     let addr: SocketAddr = "0.0.0.0:40009".parse()?;
//!
//!     // Echo the text prefix of every datagram back to its sender.
//!     let mut server = UdpServer::new(addr, true, shutdown)?;
//!     server.run();
//!     Ok(())
//! }
//! ```
//!
//! - Use [`ClientSupervisor`] to run a load generating session against a
//!   server, with a wall clock deadline:
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use udprobe::{ClientSupervisor, ProbeError, ShutdownSignal};
//!
//! fn main() -> Result<(), ProbeError> {
//!     let shutdown = Arc::new(ShutdownSignal::new());
//!     let peer: SocketAddr = "192.0.2.7:40009".parse()?;
//!
//!     // Four worker pairs, 1300 byte MTU, stop after ten seconds.
//!     let supervisor =
//!         ClientSupervisor::new(peer, 1300, 4, Some(Duration::from_secs(10)), shutdown);
//!     supervisor.run()?;
//!     Ok(())
//! }
//! ```
//!
//! - Each report tick prints one line per [`PacketStats`]:
//!
//! ```console
//! client0-TX: 120.52 K pps, 1.28 G bps
//! client0-RX: 119.87 K pps, 1.27 G bps
//! ```
//!
//! Stopping is cooperative everywhere: all loops share one
//! [`ShutdownSignal`] and poll it once per iteration, so a stop request or
//! an elapsed deadline winds the whole session down within one receive
//! timeout. A second stop request escalates and the process exits
//! immediately.

use std::time::Duration;

/// Bound on every blocking receive, so loops recheck the shutdown signal
/// and their timers even with no traffic.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Cadence of the live rate reports.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

mod client;
pub use client::{ClientSupervisor, RxWorker, TxWorker};
mod config;
pub use config::{Config, Role};
mod counter;
pub use counter::{PacketStats, RateCounter, WIRE_OVERHEAD, rate_to_human};
mod errors;
pub use errors::ProbeError;
mod payload;
pub use payload::MTU_OVERHEAD;
mod server;
pub use server::UdpServer;
mod shutdown;
pub use shutdown::{ShutdownSignal, ShutdownState};

// async part
mod async_client;
pub use async_client::AsyncClientSupervisor;
mod async_server;
pub use async_server::AsyncUdpServer;
