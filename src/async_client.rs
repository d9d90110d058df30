//! Async rendition of the client engine, for embedding in a tokio runtime.
//!
//! [`AsyncClientSupervisor`] spawns the same tx/rx worker pairs as the
//! threaded [`crate::ClientSupervisor`], as tokio tasks instead of OS
//! threads. Unlike the threaded supervisor, a sender hitting a fatal error
//! does not exit the process: it requests shutdown and the error surfaces
//! from [`AsyncClientSupervisor::run`], so an embedding application decides
//! what to do with its process.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{Instant, sleep, timeout};

use crate::counter::PacketStats;
use crate::errors::ProbeError;
use crate::payload::{self, MAX_DATAGRAM, MTU_OVERHEAD};
use crate::shutdown::ShutdownSignal;
use crate::{POLL_TIMEOUT, REPORT_INTERVAL};

/// Transmit half of an async worker pair.
#[derive(Debug)]
struct AsyncTxWorker {
    id: usize,
    sock: Arc<UdpSocket>,
    peer: SocketAddr,
    payload_size: usize,
    stats: Arc<PacketStats>,
    rx_stats: Arc<PacketStats>,
    shutdown: Arc<ShutdownSignal>,
}

impl AsyncTxWorker {
    async fn run(&self) -> Result<(), ProbeError> {
        while self.shutdown.is_running() {
            let datagram = payload::build(
                self.id,
                self.rx_stats.packets().read(),
                self.payload_size,
            )?;

            self.sock
                .send_to(&datagram, self.peer)
                .await
                .map_err(ProbeError::SendFailed)?;
            self.stats.account(datagram.len());

            // A ready socket would otherwise never yield; keep the loop
            // cooperative on a shared runtime.
            tokio::task::yield_now().await;
        }

        Ok(())
    }
}

/// Receive half of an async worker pair.
#[derive(Debug)]
struct AsyncRxWorker {
    id: usize,
    sock: Arc<UdpSocket>,
    peer: SocketAddr,
    stats: Arc<PacketStats>,
    shutdown: Arc<ShutdownSignal>,
}

impl AsyncRxWorker {
    async fn run(&self) {
        let mut buf = [0u8; MAX_DATAGRAM];

        while self.shutdown.is_running() {
            let (len, from) = match timeout(POLL_TIMEOUT, self.sock.recv_from(&mut buf)).await {
                Ok(Ok(received)) => received,
                Ok(Err(_)) | Err(_) => continue,
            };

            if from != self.peer {
                log::warn!("client{}: address {from} mismatch, discarding", self.id);
                continue;
            }

            self.stats.account(len);
        }
    }
}

/// Async counterpart of [`crate::ClientSupervisor`].
#[derive(Debug)]
pub struct AsyncClientSupervisor {
    peer: SocketAddr,
    payload_size: usize,
    nthread: usize,
    duration: Option<Duration>,
    shutdown: Arc<ShutdownSignal>,
}

impl AsyncClientSupervisor {
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
    /// # Errors
    ///
    /// [`ProbeError::BindFailed`] when a worker socket cannot be bound, or
    /// the first fatal worker error ([`ProbeError::SendFailed`],
    /// [`ProbeError::PayloadTooLarge`]) once all tasks have stopped.
    pub async fn run(&self) -> Result<(), ProbeError> {
        let bind_addr: SocketAddr = if self.peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let mut tx_stats = Vec::with_capacity(self.nthread);
        let mut rx_stats = Vec::with_capacity(self.nthread);
        let mut handles = Vec::with_capacity(self.nthread * 2);

        for i in 0..self.nthread {
            let sock = Arc::new(
                UdpSocket::bind(bind_addr)
                    .await
                    .map_err(ProbeError::BindFailed)?,
            );

            let tx = Arc::new(PacketStats::new(format!("client{i}-TX")));
            let rx = Arc::new(PacketStats::new(format!("client{i}-RX")));

            let tx_worker = AsyncTxWorker {
                id: i,
                sock: sock.clone(),
                peer: self.peer,
                payload_size: self.payload_size,
                stats: tx.clone(),
                rx_stats: rx.clone(),
                shutdown: self.shutdown.clone(),
            };
            let rx_worker = AsyncRxWorker {
                id: i,
                sock,
                peer: self.peer,
                stats: rx.clone(),
                shutdown: self.shutdown.clone(),
            };

            let stop = self.shutdown.clone();
            handles.push(tokio::spawn(async move {
                let result = tx_worker.run().await;
                if let Err(e) = &result {
                    log::error!("sender {i} aborted: {e}");
                    stop.stop();
                }
                result
            }));
            handles.push(tokio::spawn(async move {
                rx_worker.run().await;
                Ok(())
            }));

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
            sleep(tick).await;

            for i in 0..self.nthread {
                println!("{}", tx_stats[i].display());
                println!("{}", rx_stats[i].display());
            }
        }

        self.shutdown.stop();

        let mut failed = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failed = failed.or(Some(e)),
                Err(e) => log::error!("worker task panicked: {e}"),
            }
        }

        match failed {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
