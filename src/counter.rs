//! Windowed rate counters behind the live throughput reports.
//!
//! This module provides [`RateCounter`] and [`PacketStats`]. A worker owns
//! the producer side (`count`/`account`) while the reporting thread reads
//! rates through `snapshot_rate`/`display`. The counters are plain atomics:
//! a slightly stale read is fine for a live rate display, so no locking is
//! involved.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Ethernet (14) + IP (20) + UDP (8) header bytes that ride on the wire with
/// every datagram but never appear in the application payload.
pub const WIRE_OVERHEAD: usize = 14 + 20 + 8;

/// A cumulative counter that yields per-second rates over the window since
/// the previous snapshot.
///
/// Any number of increments may come from one producer thread; the snapshot
/// side belongs to exactly one consumer. Calling [`RateCounter::snapshot_rate`]
/// from more than one place would make the windows meaningless.
#[derive(Debug)]
pub struct RateCounter {
    cumulative: AtomicU64,
    snap_count: AtomicU64,
    /// Nanoseconds from `origin` at the last snapshot.
    snap_nanos: AtomicU64,
    origin: Instant,
}

impl RateCounter {
    pub fn new() -> Self {
        Self {
            cumulative: AtomicU64::new(0),
            snap_count: AtomicU64::new(0),
            snap_nanos: AtomicU64::new(0),
            origin: Instant::now(),
        }
    }

    /// Adds `n` to the cumulative total. Producer side.
    pub fn count(&self, n: u64) {
        // Relaxed: telemetry only, nothing orders against these loads.
        self.cumulative.fetch_add(n, Ordering::Relaxed);
    }

    /// Current cumulative total, without disturbing the snapshot window.
    pub fn read(&self) -> u64 {
        self.cumulative.load(Ordering::Relaxed)
    }

    /// Rate per second since the previous snapshot, resetting the window.
    ///
    /// Returns `0.0` when the clock has not advanced since the last call
    /// rather than dividing by zero.
    pub fn snapshot_rate(&self) -> f64 {
        let total = self.read();
        let now_nanos = self.origin.elapsed().as_nanos() as u64;

        let prev_count = self.snap_count.swap(total, Ordering::Relaxed);
        let prev_nanos = self.snap_nanos.swap(now_nanos, Ordering::Relaxed);

        let delta = total.saturating_sub(prev_count);
        let elapsed_nanos = now_nanos.saturating_sub(prev_nanos);
        if elapsed_nanos == 0 {
            return 0.0;
        }

        delta as f64 / (elapsed_nanos as f64 / 1e9)
    }
}

impl Default for RateCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats a rate with a scale suffix: `G` above 1e9, `M` above 1e6, `K`
/// above 1e3, bare otherwise. Two decimals in every case.
pub fn rate_to_human(rate: f64) -> String {
    if rate > 1e9 {
        format!("{:.2} G", rate / 1e9)
    } else if rate > 1e6 {
        format!("{:.2} M", rate / 1e6)
    } else if rate > 1e3 {
        format!("{:.2} K", rate / 1e3)
    } else {
        format!("{rate:.2}")
    }
}

/// Packet and bit counters for one traffic direction, under a display label.
#[derive(Debug)]
pub struct PacketStats {
    label: String,
    packets: RateCounter,
    bits: RateCounter,
}

impl PacketStats {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            packets: RateCounter::new(),
            bits: RateCounter::new(),
        }
    }

    /// Accounts one datagram of `payload_len` bytes: one packet, and the
    /// payload plus wire overhead in bits.
    pub fn account(&self, payload_len: usize) {
        self.packets.count(1);
        self.bits.count(((payload_len + WIRE_OVERHEAD) * 8) as u64);
    }

    pub fn packets(&self) -> &RateCounter {
        &self.packets
    }

    pub fn bits(&self) -> &RateCounter {
        &self.bits
    }

    /// One report line, `"<label>: <pps> pps, <bps> bps"`.
    ///
    /// Snapshots both counters, so this must be called from a single
    /// reporting site per stats instance.
    pub fn display(&self) -> String {
        format!(
            "{}: {} pps, {} bps",
            self.label,
            rate_to_human(self.packets.snapshot_rate()),
            rate_to_human(self.bits.snapshot_rate()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn read_is_the_sum_of_all_counts() {
        let counter = RateCounter::new();
        assert_eq!(counter.read(), 0);

        counter.count(1);
        counter.count(41);
        counter.count(0);
        assert_eq!(counter.read(), 42);
    }

    #[test]
    fn snapshot_right_after_count_is_finite() {
        let counter = RateCounter::new();
        counter.count(5);

        let rate = counter.snapshot_rate();
        assert!(rate.is_finite());
        assert!(rate >= 0.0);
    }

    #[test]
    fn snapshot_resets_the_window() {
        let counter = RateCounter::new();
        counter.count(1000);
        counter.snapshot_rate();

        // No new counts since the snapshot, so the next window is empty.
        thread::sleep(Duration::from_millis(5));
        assert_eq!(counter.snapshot_rate(), 0.0);
        assert_eq!(counter.read(), 1000);
    }

    #[test]
    fn account_adds_packet_and_overhead_bits() {
        let stats = PacketStats::new("test");
        stats.account(100);

        assert_eq!(stats.packets().read(), 1);
        assert_eq!(stats.bits().read(), ((100 + WIRE_OVERHEAD) * 8) as u64);

        stats.account(0);
        assert_eq!(stats.packets().read(), 2);
        assert_eq!(
            stats.bits().read(),
            ((100 + WIRE_OVERHEAD) * 8 + WIRE_OVERHEAD * 8) as u64
        );
    }

    #[test]
    fn rates_scale_with_the_first_threshold_exceeded() {
        assert_eq!(rate_to_human(2_500_000_000.0), "2.50 G");
        assert_eq!(rate_to_human(1_500_000.0), "1.50 M");
        assert_eq!(rate_to_human(1_500.0), "1.50 K");
        assert_eq!(rate_to_human(999.0), "999.00");
        assert_eq!(rate_to_human(0.0), "0.00");
    }

    #[test]
    fn display_renders_label_and_units() {
        let stats = PacketStats::new("client0-TX");
        stats.account(1258);

        let line = stats.display();
        assert!(line.starts_with("client0-TX: "));
        assert!(line.contains(" pps, "));
        assert!(line.ends_with(" bps"));
    }
}
