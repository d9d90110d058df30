//! The client side of the probe: worker pairs that flood the server and a
//! supervisor that reports their rates.
//!
//! Each logical client thread is a [`TxWorker`]/[`RxWorker`] pair sharing
//! one socket, so acknowledgements come back to the port the traffic left
//! from. The pair's counters belong to its workers; [`ClientSupervisor`]
//! only reads them for the one-second reports. Everything winds down through
//! the shared [`ShutdownSignal`].

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::counter::PacketStats;
use crate::errors::ProbeError;
use crate::payload::{self, MAX_DATAGRAM, MTU_OVERHEAD};
use crate::shutdown::ShutdownSignal;
use crate::{POLL_TIMEOUT, REPORT_INTERVAL};

/// Transmit half of a worker pair. Sends fixed size datagrams to the peer
/// as fast as the socket accepts them, accounting each into its own stats.
#[derive(Debug)]
pub struct TxWorker {
    id: usize,
    sock: Arc<UdpSocket>,
    peer: SocketAddr,
    payload_size: usize,
    stats: Arc<PacketStats>,
    /// Stats of the paired receive worker; its packet count rides along in
    /// every payload as a liveness indicator.
    rx_stats: Arc<PacketStats>,
    shutdown: Arc<ShutdownSignal>,
}

impl TxWorker {
    pub fn new(
        id: usize,
        sock: Arc<UdpSocket>,
        peer: SocketAddr,
        payload_size: usize,
        stats: Arc<PacketStats>,
        rx_stats: Arc<PacketStats>,
        shutdown: Arc<ShutdownSignal>,
    ) -> Self {
        Self {
            id,
            sock,
            peer,
            payload_size,
            stats,
            rx_stats,
            shutdown,
        }
    }

    /// Sends until the shutdown signal leaves `Running`.
    ///
    /// # Errors
    ///
    /// [`ProbeError::PayloadTooLarge`] when the payload text cannot fit the
    /// configured budget and [`ProbeError::SendFailed`] when a send fails.
    /// Both are unrecoverable for the whole session; the caller decides how
    /// to take the process down.
    pub fn run(&self) -> Result<(), ProbeError> {
        // The shutdown check is the only pause in this loop: it must stay
        // once per iteration even at maximal send throughput.
        while self.shutdown.is_running() {
            let datagram = payload::build(
                self.id,
                self.rx_stats.packets().read(),
                self.payload_size,
            )?;

            self.sock
                .send_to(&datagram, self.peer)
                .map_err(ProbeError::SendFailed)?;
            self.stats.account(datagram.len());
        }

        Ok(())
    }
}

/// Receive half of a worker pair. Accounts datagrams arriving from the
/// expected peer; anything else is discarded with a warning.
#[derive(Debug)]
pub struct RxWorker {
    id: usize,
    sock: Arc<UdpSocket>,
    peer: SocketAddr,
    stats: Arc<PacketStats>,
    shutdown: Arc<ShutdownSignal>,
}

impl RxWorker {
    /// The socket must carry a receive timeout; it bounds how long this
    /// worker can miss the shutdown signal on a quiet network.
    pub fn new(
        id: usize,
        sock: Arc<UdpSocket>,
        peer: SocketAddr,
        stats: Arc<PacketStats>,
        shutdown: Arc<ShutdownSignal>,
    ) -> Self {
        Self {
            id,
            sock,
            peer,
            stats,
            shutdown,
        }
    }

    pub fn run(&self) {
        let mut buf = [0u8; MAX_DATAGRAM];

        while self.shutdown.is_running() {
            let (len, from) = match self.sock.recv_from(&mut buf) {
                Ok(received) => received,
                // Timeouts and transient errors just restart the poll.
                Err(_) => continue,
            };

            if from != self.peer {
                log::warn!("client{}: address {from} mismatch, discarding", self.id);
                continue;
            }

            self.stats.account(len);
        }
    }
}

/// Starts the worker pairs, prints their rates every second and joins them
/// all once the session ends.
#[derive(Debug)]
pub struct ClientSupervisor {
    peer: SocketAddr,
    payload_size: usize,
    nthread: usize,
    duration: Option<Duration>,
    shutdown: Arc<ShutdownSignal>,
}

impl ClientSupervisor {
    /// `mtu` is the total datagram size budget; payloads are `mtu` minus the
    /// IP and UDP header bytes.
    pub fn new(
        peer: SocketAddr,
        mtu: usize,
        nthread: usize,
        duration: Option<Duration>,
        shutdown: Arc<ShutdownSignal>,
    ) -> Self {
        Self {
            peer,
            payload_size: mtu.saturating_sub(MTU_OVERHEAD),
            nthread,
            duration,
            shutdown,
        }
    }

    /// Runs the session: spawn all pairs, report until the shutdown signal
    /// leaves `Running` or the deadline elapses, then stop and join.
    ///
    /// A sender hitting an unrecoverable error (send failure, payload that
    /// cannot fit the MTU) logs it and exits the process with a non-zero
    /// status; there is nothing to salvage from a load generator that cannot
    /// send.
    ///
    /// # Errors
    ///
    /// [`ProbeError::BindFailed`] or [`ProbeError::SocketConfig`] when a
    /// worker socket cannot be set up.
    pub fn run(&self) -> Result<(), ProbeError> {
        let bind_addr: SocketAddr = if self.peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let mut tx_stats = Vec::with_capacity(self.nthread);
        let mut rx_stats = Vec::with_capacity(self.nthread);
        let mut handles = Vec::with_capacity(self.nthread * 2);

        for i in 0..self.nthread {
            let sock = UdpSocket::bind(bind_addr).map_err(ProbeError::BindFailed)?;
            sock.set_read_timeout(Some(POLL_TIMEOUT))
                .map_err(ProbeError::SocketConfig)?;
            let sock = Arc::new(sock);

            let tx = Arc::new(PacketStats::new(format!("client{i}-TX")));
            let rx = Arc::new(PacketStats::new(format!("client{i}-RX")));

            let tx_worker = TxWorker::new(
                i,
                sock.clone(),
                self.peer,
                self.payload_size,
                tx.clone(),
                rx.clone(),
                self.shutdown.clone(),
            );
            let rx_worker = RxWorker::new(i, sock, self.peer, rx.clone(), self.shutdown.clone());

            handles.push(thread::spawn(move || {
                if let Err(e) = tx_worker.run() {
                    log::error!("sender {i} aborted: {e}");
                    process::exit(1);
                }
            }));
            handles.push(thread::spawn(move || rx_worker.run()));

            tx_stats.push(tx);
            rx_stats.push(rx);
        }

        let start = Instant::now();
        while self.shutdown.is_running() {
            let tick = match self.duration {
                Some(limit) => {
                    let remaining = limit.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        break;
                    }
                    remaining.min(REPORT_INTERVAL)
                }
                None => REPORT_INTERVAL,
            };
            thread::sleep(tick);

            for i in 0..self.nthread {
                println!("{}", tx_stats[i].display());
                println!("{}", rx_stats[i].display());
            }
        }

        // The deadline acts as an internally generated stop request.
        self.shutdown.stop();
        for handle in handles {
            // A worker that hit a fatal error already took the process down.
            let _ = handle.join();
        }

        Ok(())
    }
}
