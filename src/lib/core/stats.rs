use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running counters for one queue. Ingestion only bumps `received` and
/// `rejected`; everything else is written by the transmitter alone.
#[derive(Debug, Default)]
pub struct QueueStats {
    received: AtomicU64,
    rejected: AtomicU64,
    batches_sent: AtomicU64,
    transmit_failures: AtomicU64,
    dropped: AtomicU64,
    decode_anomalies: AtomicU64,
    depth: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub rejected: u64,
    pub batches_sent: u64,
    pub transmit_failures: u64,
    pub dropped: u64,
    pub decode_anomalies: u64,
    pub depth: u64,
}

impl QueueStats {
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch_sent(&self) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transmit_failure(&self) {
        self.transmit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, count: usize) {
        self.dropped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_anomalies(&self, count: usize) {
        self.decode_anomalies.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_depth(&self, depth: usize) {
        self.depth.store(depth as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            transmit_failures: self.transmit_failures.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            decode_anomalies: self.decode_anomalies.load(Ordering::Relaxed),
            depth: self.depth.load(Ordering::Relaxed),
        }
    }
}
