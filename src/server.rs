//! The server side of the probe: count everything, acknowledge on request.
//!
//! This module provides [`UdpServer`], a single threaded receive loop that
//! accounts every datagram into a [`PacketStats`] and prints one report line
//! per second. With ACK mode enabled it echoes the text prefix of each
//! datagram back to its sender, so clients can observe their own traffic
//! arriving.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Instant;

use crate::counter::PacketStats;
use crate::errors::ProbeError;
use crate::payload::{MAX_DATAGRAM, echo_prefix};
use crate::shutdown::ShutdownSignal;
use crate::{POLL_TIMEOUT, REPORT_INTERVAL};

#[derive(Debug)]
pub struct UdpServer {
    sock: UdpSocket,
    stats: PacketStats,
    ack: bool,
    shutdown: Arc<ShutdownSignal>,
}

impl UdpServer {
    /// Creates a server bound to `addr`.
    ///
    /// The socket receive timeout is the loop's poll interval: it bounds how
    /// long a quiet network can keep the loop from noticing the report timer
    /// or the shutdown signal.
    ///
    /// # Errors
    ///
    /// [`ProbeError::BindFailed`] if the address cannot be bound,
    /// [`ProbeError::SocketConfig`] if the receive timeout cannot be set.
    pub fn new(
        addr: SocketAddr,
        ack: bool,
        shutdown: Arc<ShutdownSignal>,
    ) -> Result<Self, ProbeError> {
        let sock = UdpSocket::bind(addr).map_err(ProbeError::BindFailed)?;
        sock.set_read_timeout(Some(POLL_TIMEOUT))
            .map_err(ProbeError::SocketConfig)?;

        Ok(Self {
            sock,
            stats: PacketStats::new("server"),
            ack,
            shutdown,
        })
    }

    /// The address the server actually bound, useful with a port of 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.sock.local_addr()
    }

    pub fn stats(&self) -> &PacketStats {
        &self.stats
    }

    /// Runs the receive loop until the shutdown signal leaves `Running`.
    ///
    /// Receive timeouts and transient socket errors restart the poll; a
    /// datagram without a `'#'` delimiter in ACK mode is logged and skipped.
    /// Nothing that arrives on the wire terminates this loop.
    pub fn run(&mut self) {
        let mut buf = [0u8; MAX_DATAGRAM];
        let mut last_report = Instant::now();

        while self.shutdown.is_running() {
            if last_report.elapsed() >= REPORT_INTERVAL {
                println!("{}", self.stats.display());
                last_report = Instant::now();
            }

            let (len, from) = match self.sock.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) => {
                    if !matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) {
                        log::debug!("transient receive error: {e}");
                    }
                    continue;
                }
            };

            self.stats.account(len);

            if self.ack {
                match echo_prefix(&buf[..len]) {
                    Some(prefix) => {
                        // Best effort: a dropped ack is indistinguishable
                        // from a lost packet to the client anyway.
                        if let Err(e) = self.sock.send_to(prefix, from) {
                            log::warn!("failed to ack {from}: {e}");
                        }
                    }
                    None => log::warn!("datagram from {from} has no '#' delimiter, skipping ack"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    /// Starts a server on a loopback port and returns its address, the
    /// shared shutdown signal and the join handle, which yields the server
    /// back for inspecting its stats.
    fn spawn_server(ack: bool) -> (SocketAddr, Arc<ShutdownSignal>, thread::JoinHandle<UdpServer>) {
        let shutdown = Arc::new(ShutdownSignal::new());
        let mut server =
            UdpServer::new("127.0.0.1:0".parse().unwrap(), ack, shutdown.clone()).unwrap();
        let addr = server.local_addr().unwrap();

        let handle = thread::spawn(move || {
            server.run();
            server
        });

        (addr, shutdown, handle)
    }

    fn probe_socket() -> UdpSocket {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        sock
    }

    #[test]
    fn ack_mode_echoes_the_text_prefix() {
        let (addr, shutdown, handle) = spawn_server(true);
        let sock = probe_socket();

        sock.send_to(b"7-3####", addr).unwrap();

        let mut buf = [0u8; 64];
        let (len, from) = sock.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"7-3");
        assert_eq!(from, addr);

        shutdown.request_stop();
        handle.join().unwrap();
    }

    #[test]
    fn malformed_datagram_is_counted_and_skipped() {
        let (addr, shutdown, handle) = spawn_server(true);
        let sock = probe_socket();

        // No delimiter: must not kill the loop, and must not be acked.
        sock.send_to(b"no delimiter at all", addr).unwrap();
        sock.send_to(b"1-0##", addr).unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = sock.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"1-0");

        shutdown.request_stop();
        let server = handle.join().unwrap();
        assert_eq!(server.stats().packets().read(), 2);
    }

    #[test]
    fn without_ack_nothing_is_echoed() {
        let (addr, shutdown, handle) = spawn_server(false);
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();

        sock.send_to(b"0-0####", addr).unwrap();

        let mut buf = [0u8; 64];
        assert!(sock.recv_from(&mut buf).is_err());

        shutdown.request_stop();
        let server = handle.join().unwrap();
        assert_eq!(server.stats().packets().read(), 1);
    }

    #[test]
    fn stops_within_one_poll_interval() {
        let (_addr, shutdown, handle) = spawn_server(false);
        thread::sleep(Duration::from_millis(50));

        let requested = Instant::now();
        shutdown.request_stop();
        handle.join().unwrap();

        assert!(requested.elapsed() < Duration::from_secs(1));
    }
}
