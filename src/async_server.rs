//! Async rendition of the probe server, for embedding in a tokio runtime.
//!
//! [`AsyncUdpServer`] mirrors the threaded [`crate::UdpServer`] exactly:
//! same counters, same shutdown protocol, same wire format. The blocking
//! receive timeout becomes a `tokio::time::timeout` around `recv_from`.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout};

use crate::counter::PacketStats;
use crate::errors::ProbeError;
use crate::payload::{MAX_DATAGRAM, echo_prefix};
use crate::shutdown::ShutdownSignal;
use crate::{POLL_TIMEOUT, REPORT_INTERVAL};

#[derive(Debug)]
pub struct AsyncUdpServer {
    sock: UdpSocket,
    stats: PacketStats,
    ack: bool,
    shutdown: Arc<ShutdownSignal>,
}

impl AsyncUdpServer {
    /// Creates a server bound to `addr`.
    ///
    /// # Errors
    ///
    /// [`ProbeError::BindFailed`] if the address cannot be bound.
    pub async fn new(
        addr: SocketAddr,
        ack: bool,
        shutdown: Arc<ShutdownSignal>,
    ) -> Result<Self, ProbeError> {
        let sock = UdpSocket::bind(addr).await.map_err(ProbeError::BindFailed)?;

        Ok(Self {
            sock,
            stats: PacketStats::new("server"),
            ack,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.sock.local_addr()
    }

    pub fn stats(&self) -> &PacketStats {
        &self.stats
    }

    /// Runs the receive loop until the shutdown signal leaves `Running`.
    /// Semantics match the sync server: nothing on the wire is fatal.
    pub async fn run(&mut self) {
        let mut buf = [0u8; MAX_DATAGRAM];
        let mut last_report = Instant::now();

        while self.shutdown.is_running() {
            if last_report.elapsed() >= REPORT_INTERVAL {
                println!("{}", self.stats.display());
                last_report = Instant::now();
            }

            let (len, from) = match timeout(POLL_TIMEOUT, self.sock.recv_from(&mut buf)).await {
                Ok(Ok(received)) => received,
                Ok(Err(e)) => {
                    log::debug!("transient receive error: {e}");
                    continue;
                }
                // Poll timeout: recheck the report timer and the signal.
                Err(_) => continue,
            };

            self.stats.account(len);

            if self.ack {
                match echo_prefix(&buf[..len]) {
                    Some(prefix) => {
                        if let Err(e) = self.sock.send_to(prefix, from).await {
                            log::warn!("failed to ack {from}: {e}");
                        }
                    }
                    None => log::warn!("datagram from {from} has no '#' delimiter, skipping ack"),
                }
            }
        }
    }
}
